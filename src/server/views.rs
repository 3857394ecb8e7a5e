//! Server-rendered HTML pages: landing, upload form and gallery.

use crate::model::{GalleryEntry, GalleryView, DEFAULT_LEVEL, DEFAULT_OPACITY, DEFAULT_RESOLUTION};

use super::auth::AuthenticatedUser;

/// Escape HTML special characters to prevent XSS attacks.
pub fn html_escape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&#x27;"),
            _ => result.push(c),
        }
    }
    result
}

const STYLE: &str = r#"
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            background: #f4f4f6;
            color: #1d1d1f;
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, sans-serif;
        }
        header {
            display: flex;
            justify-content: space-between;
            align-items: center;
            padding: 16px 32px;
            background: #1d1d1f;
            color: #fff;
        }
        header a { color: #fff; margin-left: 16px; text-decoration: none; }
        main { max-width: 1100px; margin: 32px auto; padding: 0 16px; }
        h1 { font-size: 28px; margin-bottom: 16px; }
        .notice { padding: 24px; background: #fff; border-radius: 8px; }
        form label { display: block; margin: 12px 0 4px; font-weight: 600; }
        form input[type=text], form input[type=number], form select { padding: 6px; width: 240px; }
        .row { display: flex; gap: 16px; align-items: flex-end; }
        button { padding: 8px 16px; border: 0; border-radius: 6px; background: #0071e3; color: #fff; cursor: pointer; }
        button.danger { background: #d70015; }
        .grid { display: grid; grid-template-columns: repeat(auto-fill, minmax(220px, 1fr)); gap: 16px; }
        .card { background: #fff; border-radius: 8px; overflow: hidden; }
        .card img { width: 100%; height: 180px; object-fit: cover; display: block; }
        .card .missing { height: 180px; display: flex; align-items: center; justify-content: center; color: #888; }
        .card .meta { padding: 8px 12px; font-size: 13px; }
        .card .actions { display: flex; justify-content: space-between; padding: 0 12px 12px; }
        #status { margin-top: 16px; white-space: pre-wrap; }
"#;

fn layout(title: &str, user: Option<&AuthenticatedUser>, body: &str) -> String {
    let (who, query) = match user {
        Some(u) => (
            format!("Signed in as {}", html_escape(&u.user_id)),
            format!("?{}", html_escape(&u.auth_query)),
        ),
        None => ("Signed out".to_string(), String::new()),
    };

    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title} - Image Tweak</title>
    <style>{STYLE}</style>
</head>
<body>
    <header>
        <strong>Image Tweak</strong>
        <nav>
            <span>{who}</span>
            <a href="/{query}">Home</a>
            <a href="/upload{query}">Upload</a>
            <a href="/gallery{query}">Gallery</a>
        </nav>
    </header>
    <main>
{body}
    </main>
</body>
</html>"##,
        title = html_escape(title),
    )
}

fn signed_out(action: &str) -> String {
    format!(
        r#"        <div class="notice">Please sign in to {}.</div>"#,
        html_escape(action)
    )
}

/// Landing page with links to the upload form and the gallery.
pub fn landing_page(user: Option<&AuthenticatedUser>) -> String {
    let body = match user {
        Some(u) => {
            let query = html_escape(&u.auth_query);
            format!(
                r#"        <h1>Welcome</h1>
        <div class="notice">
            <p>Upload up to a handful of images, adjust them, and keep them in your gallery.</p>
            <p><a href="/upload?{query}">Upload images</a> &middot; <a href="/gallery?{query}">View gallery</a></p>
        </div>"#
            )
        }
        None => r#"        <h1>Welcome</h1>
        <div class="notice">Sign in to upload and manage your images.</div>"#
            .to_string(),
    };
    layout("Home", user, &body)
}

/// Upload form submitting to `/api/upload`.
pub fn upload_page(user: Option<&AuthenticatedUser>, max_files: usize) -> String {
    let Some(u) = user else {
        return layout("Upload", None, &signed_out("upload images"));
    };

    let body = format!(
        r##"        <h1>Upload images</h1>
        <form id="upload-form">
            <label for="files">Images (up to {max_files})</label>
            <input id="files" name="files" type="file" accept="image/png,image/jpeg,image/webp" multiple required>

            <label for="filename">File name override</label>
            <input id="filename" type="text" placeholder="keep original names">

            <label for="brightness">Brightness <output id="brightness-value">{level}</output></label>
            <input id="brightness" type="range" min="0" max="100" value="{level}">
            <label for="contrast">Contrast <output id="contrast-value">{level}</output></label>
            <input id="contrast" type="range" min="0" max="100" value="{level}">
            <label for="saturation">Saturation <output id="saturation-value">{level}</output></label>
            <input id="saturation" type="range" min="0" max="100" value="{level}">
            <label for="opacity">Opacity <output id="opacity-value">{opacity}</output></label>
            <input id="opacity" type="range" min="0" max="100" value="{opacity}">

            <div class="row">
                <div>
                    <label for="res-x">Width</label>
                    <input id="res-x" type="number" min="1" value="{resolution}">
                </div>
                <div>
                    <label for="res-y">Height</label>
                    <input id="res-y" type="number" min="1" value="{resolution}">
                </div>
                <div>
                    <label><input id="aspect-lock" type="checkbox" checked> Lock aspect ratio</label>
                </div>
            </div>

            <label for="rotation">Rotation</label>
            <select id="rotation">
                <option value="0">0&deg;</option>
                <option value="90">90&deg;</option>
                <option value="180">180&deg;</option>
                <option value="270">270&deg;</option>
            </select>

            <label for="format">Output format</label>
            <select id="format">
                <option value="png">PNG</option>
                <option value="jpeg">JPEG</option>
                <option value="webp">WebP</option>
            </select>

            <p style="margin-top: 16px"><button type="submit">Upload</button></p>
        </form>
        <div id="status"></div>
        <script>
            const authQuery = "{auth_query}";
            const maxFiles = {max_files};
            const form = document.getElementById("upload-form");
            const status = document.getElementById("status");

            for (const id of ["brightness", "contrast", "saturation", "opacity"]) {{
                const input = document.getElementById(id);
                input.addEventListener("input", () => {{
                    document.getElementById(id + "-value").textContent = input.value;
                }});
            }}

            const resX = document.getElementById("res-x");
            const resY = document.getElementById("res-y");
            const lock = document.getElementById("aspect-lock");
            let ratio = 1;
            lock.addEventListener("change", () => {{
                ratio = Number(resX.value) / Math.max(1, Number(resY.value));
            }});
            resX.addEventListener("input", () => {{
                if (lock.checked) resY.value = Math.max(1, Math.round(Number(resX.value) / ratio));
            }});
            resY.addEventListener("input", () => {{
                if (lock.checked) resX.value = Math.max(1, Math.round(Number(resY.value) * ratio));
            }});

            form.addEventListener("submit", async (event) => {{
                event.preventDefault();
                const files = document.getElementById("files").files;
                if (files.length === 0 || files.length > maxFiles) {{
                    status.textContent = "Select between 1 and " + maxFiles + " images.";
                    return;
                }}

                const metadata = {{
                    imageParameters: {{
                        overwrittenFilename: document.getElementById("filename").value,
                        resX: Number(resX.value),
                        resY: Number(resY.value),
                        rotationState: Number(document.getElementById("rotation").value),
                        brightness: Number(document.getElementById("brightness").value),
                        contrast: Number(document.getElementById("contrast").value),
                        saturation: Number(document.getElementById("saturation").value),
                        opacity: Number(document.getElementById("opacity").value),
                        outputFormat: document.getElementById("format").value,
                    }},
                }};

                const body = new FormData();
                body.append("metadata", new Blob([JSON.stringify(metadata)], {{ type: "application/json" }}));
                for (const file of files) body.append("files", file, file.name);

                status.textContent = "Uploading...";
                const response = await fetch("/api/upload?" + authQuery, {{ method: "POST", body }});
                const result = await response.json();
                if (response.ok) {{
                    status.textContent = "Uploaded " + result.uploadedFiles.length + " image(s). Processing: " + result.processing.status;
                }} else {{
                    status.textContent = "Upload failed: " + result.message;
                }}
            }});
        </script>"##,
        level = DEFAULT_LEVEL,
        opacity = DEFAULT_OPACITY,
        resolution = DEFAULT_RESOLUTION,
        auth_query = html_escape(&u.auth_query),
    );

    layout("Upload", user, &body)
}

fn gallery_card(entry: &GalleryEntry, auth_query: &str) -> String {
    let name = html_escape(&entry.display_name);
    let key = html_escape(&entry.key);
    let encoded_key = urlencoding::encode(&entry.key);

    let preview = if entry.available {
        format!(
            r#"<img src="data:{};base64,{}" alt="{}">"#,
            html_escape(&entry.content_type),
            entry.content,
            name
        )
    } else {
        r#"<div class="missing">Unavailable</div>"#.to_string()
    };

    format!(
        r#"            <div class="card">
                {preview}
                <div class="meta"><strong>{name}</strong><br>{start_time}</div>
                <div class="actions">
                    <a href="/api/download/{encoded_key}?{auth_query}">Download</a>
                    <button class="danger" data-key="{key}">Delete</button>
                </div>
            </div>"#,
        start_time = html_escape(&entry.start_time),
        auth_query = html_escape(auth_query),
    )
}

/// Gallery grid with inline previews, download links and delete buttons.
pub fn gallery_page(user: Option<&AuthenticatedUser>, view: &GalleryView) -> String {
    let Some(u) = user else {
        return layout("Gallery", None, &signed_out("view your gallery"));
    };

    let content = if view.is_empty() {
        r#"        <div class="notice">No images yet.</div>"#.to_string()
    } else {
        let cards: Vec<String> = view
            .images
            .iter()
            .map(|entry| gallery_card(entry, &u.auth_query))
            .collect();
        format!(
            "        <div class=\"grid\">\n{}\n        </div>",
            cards.join("\n")
        )
    };

    let body = format!(
        r##"        <h1>Your gallery ({count})</h1>
{content}
        <script>
            const authQuery = "{auth_query}";
            for (const button of document.querySelectorAll("button[data-key]")) {{
                button.addEventListener("click", async () => {{
                    if (!confirm("Delete this image?")) return;
                    const url = "/api/images/" + encodeURIComponent(button.dataset.key) + "?" + authQuery;
                    const response = await fetch(url, {{ method: "DELETE" }});
                    if (response.ok) {{
                        button.closest(".card").remove();
                    }} else {{
                        const result = await response.json();
                        alert("Delete failed: " + result.message);
                    }}
                }});
            }}
        </script>"##,
        count = view.len(),
        auth_query = html_escape(&u.auth_query),
    );

    layout("Gallery", user, &body)
}
