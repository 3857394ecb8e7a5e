//! DynamoDB-backed metadata store.
//!
//! Records live in a single table keyed by `uploadId`, with a global secondary
//! index on `user` for per-user listing. Lists are stored as `L`, the
//! parameter bundle as `M`.
//!
//! ```text
//! ImageMetaData
//! ├── uploadId          S   (hash key)
//! ├── user              S   (hash key of `user-index`)
//! ├── imageName         L<S>
//! ├── startTime         S
//! └── imageParameters   M
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use tracing::{debug, info, warn};

use super::MetadataStore;
use crate::error::StoreError;
use crate::model::{FilenameOverride, ImageParameters, OutputFormat, UploadRecord};

/// Default metadata table name.
pub const DEFAULT_TABLE_NAME: &str = "ImageMetaData";

/// Default name of the global secondary index on `user`.
pub const DEFAULT_USER_INDEX: &str = "user-index";

const UPLOAD_ID: &str = "uploadId";
const USER: &str = "user";
const IMAGE_NAME: &str = "imageName";
const START_TIME: &str = "startTime";
const IMAGE_PARAMETERS: &str = "imageParameters";

type Item = HashMap<String, AttributeValue>;

/// Metadata store backed by a DynamoDB table.
#[derive(Clone)]
pub struct DynamoMetadataStore {
    client: Client,
    table_name: String,
    user_index: String,
}

impl DynamoMetadataStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
            user_index: DEFAULT_USER_INDEX.to_string(),
        }
    }

    /// Use a differently named index for per-user queries.
    pub fn with_user_index(mut self, user_index: impl Into<String>) -> Self {
        self.user_index = user_index.into();
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn user_index(&self) -> &str {
        &self.user_index
    }

    fn decode_items(items: Option<Vec<Item>>) -> Result<Vec<UploadRecord>, StoreError> {
        items
            .unwrap_or_default()
            .iter()
            .map(item_to_record)
            .collect()
    }
}

#[async_trait]
impl MetadataStore for DynamoMetadataStore {
    async fn put_record(&self, record: &UploadRecord) -> Result<(), StoreError> {
        debug!(upload_id = %record.upload_id, "Writing upload record");

        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .send()
            .await
            .map_err(|e| StoreError::MetadataStore(format!("Failed to put record: {}", e)))?;

        Ok(())
    }

    async fn get_record(&self, upload_id: &str) -> Result<Option<UploadRecord>, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(UPLOAD_ID, AttributeValue::S(upload_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::MetadataStore(format!("Failed to get record: {}", e)))?;

        result.item.as_ref().map(item_to_record).transpose()
    }

    async fn records_for_user(&self, user: &str) -> Result<Vec<UploadRecord>, StoreError> {
        let mut records = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            // `user` is a reserved word, hence the placeholder name
            let result = self
                .client
                .query()
                .table_name(&self.table_name)
                .index_name(&self.user_index)
                .key_condition_expression("#usr = :userVal")
                .expression_attribute_names("#usr", USER)
                .expression_attribute_values(":userVal", AttributeValue::S(user.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| {
                    StoreError::MetadataStore(format!("Failed to query records: {}", e))
                })?;

            records.extend(Self::decode_items(result.items)?);

            match result.last_evaluated_key {
                Some(key) if !key.is_empty() => start_key = Some(key),
                _ => break,
            }
        }

        debug!(user = %user, count = records.len(), "Queried upload records");
        Ok(records)
    }

    async fn find_by_object_key(&self, key: &str) -> Result<Option<UploadRecord>, StoreError> {
        let mut start_key: Option<Item> = None;

        loop {
            let result = self
                .client
                .scan()
                .table_name(&self.table_name)
                .filter_expression("contains(imageName, :img)")
                .expression_attribute_values(":img", AttributeValue::S(key.to_string()))
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(|e| StoreError::MetadataStore(format!("Failed to scan records: {}", e)))?;

            // `contains` on a legacy string attribute matches substrings
            if let Some(record) = first_holding(result.items.unwrap_or_default(), key)? {
                return Ok(Some(record));
            }

            match result.last_evaluated_key {
                Some(next) if !next.is_empty() => start_key = Some(next),
                _ => return Ok(None),
            }
        }
    }

    async fn update_images(
        &self,
        upload_id: &str,
        image_name: &[String],
        image_parameters: &ImageParameters,
    ) -> Result<(), StoreError> {
        let (expression, values) = image_list_update(image_name, image_parameters);

        self.client
            .update_item()
            .table_name(&self.table_name)
            .key(UPLOAD_ID, AttributeValue::S(upload_id.to_string()))
            .update_expression(expression)
            .condition_expression("attribute_exists(uploadId)")
            .set_expression_attribute_values(Some(values))
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                if missing {
                    StoreError::NotFound(format!("upload {}", upload_id))
                } else {
                    StoreError::MetadataStore(format!("Failed to update record: {}", e))
                }
            })?;

        info!(
            upload_id = %upload_id,
            remaining = image_name.len(),
            "Updated image list"
        );
        Ok(())
    }

    async fn delete_record(&self, upload_id: &str) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(UPLOAD_ID, AttributeValue::S(upload_id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::MetadataStore(format!("Failed to delete record: {}", e)))?;

        info!(upload_id = %upload_id, "Deleted upload record");
        Ok(())
    }
}

// =============================================================================
// Item Conversion
// =============================================================================

/// Encode a record as a DynamoDB item.
pub fn record_to_item(record: &UploadRecord) -> Item {
    let mut item = HashMap::new();
    item.insert(
        UPLOAD_ID.to_string(),
        AttributeValue::S(record.upload_id.clone()),
    );
    item.insert(USER.to_string(), AttributeValue::S(record.user.clone()));
    item.insert(IMAGE_NAME.to_string(), string_list(&record.image_name));
    item.insert(
        START_TIME.to_string(),
        AttributeValue::S(record.start_time.clone()),
    );
    item.insert(
        IMAGE_PARAMETERS.to_string(),
        parameters_to_attr(&record.image_parameters),
    );
    item
}

/// Update expression and values replacing a record's key list.
///
/// The whole parameter map is written so that items stored without one
/// can still be updated.
fn image_list_update(
    image_name: &[String],
    image_parameters: &ImageParameters,
) -> (&'static str, Item) {
    let mut values = HashMap::new();
    values.insert(":names".to_string(), string_list(image_name));
    values.insert(":params".to_string(), parameters_to_attr(image_parameters));
    ("SET imageName = :names, imageParameters = :params", values)
}

/// Decode the first item of a scan page whose key list holds `key` exactly.
fn first_holding(items: Vec<Item>, key: &str) -> Result<Option<UploadRecord>, StoreError> {
    for item in &items {
        let record = item_to_record(item)?;
        if record.contains(key) {
            return Ok(Some(record));
        }
    }
    Ok(None)
}

fn parameters_to_attr(params: &ImageParameters) -> AttributeValue {
    let mut parameters = HashMap::new();
    parameters.insert(
        "overwrittenFilename".to_string(),
        override_to_attr(&params.overwritten_filename),
    );
    parameters.insert("resX".to_string(), number(params.res_x));
    parameters.insert("resY".to_string(), number(params.res_y));
    parameters.insert("rotationState".to_string(), number(params.rotation_state));
    parameters.insert("brightness".to_string(), number(params.brightness));
    parameters.insert("contrast".to_string(), number(params.contrast));
    parameters.insert("saturation".to_string(), number(params.saturation));
    parameters.insert("opacity".to_string(), number(params.opacity));
    parameters.insert(
        "outputFormat".to_string(),
        AttributeValue::S(params.output_format.as_str().to_string()),
    );
    AttributeValue::M(parameters)
}

/// Decode a DynamoDB item into a record.
///
/// `uploadId` is required. Everything else is read leniently: records written
/// by older clients may miss fields or hold a single override string.
pub fn item_to_record(item: &Item) -> Result<UploadRecord, StoreError> {
    let upload_id = match item.get(UPLOAD_ID) {
        Some(AttributeValue::S(id)) => id.clone(),
        _ => {
            return Err(StoreError::InvalidRecord {
                upload_id: "<unknown>".to_string(),
                reason: "missing uploadId".to_string(),
            })
        }
    };

    let user = match item.get(USER) {
        Some(AttributeValue::S(user)) => user.clone(),
        _ => String::new(),
    };

    let image_name = match item.get(IMAGE_NAME) {
        Some(AttributeValue::L(values)) => strings_of(values),
        Some(AttributeValue::Ss(values)) => values.clone(),
        Some(AttributeValue::S(single)) => vec![single.clone()],
        None => Vec::new(),
        Some(other) => {
            return Err(StoreError::InvalidRecord {
                upload_id,
                reason: format!("imageName has unexpected type: {:?}", other),
            })
        }
    };

    let start_time = match item.get(START_TIME) {
        Some(AttributeValue::S(time)) => time.clone(),
        _ => String::new(),
    };

    let image_parameters = match item.get(IMAGE_PARAMETERS) {
        Some(AttributeValue::M(map)) => parameters_from_map(&upload_id, map),
        _ => ImageParameters::default(),
    };

    Ok(UploadRecord {
        upload_id,
        user,
        image_name,
        start_time,
        image_parameters,
    })
}

fn parameters_from_map(upload_id: &str, map: &Item) -> ImageParameters {
    let mut params = ImageParameters::default();

    match map.get("overwrittenFilename") {
        Some(AttributeValue::S(name)) => {
            params.overwritten_filename = FilenameOverride::Single(name.clone())
        }
        Some(AttributeValue::L(values)) => {
            params.overwritten_filename = FilenameOverride::PerImage(strings_of(values))
        }
        _ => {}
    }

    if let Some(v) = number_of(map, "resX") {
        params.res_x = v;
    }
    if let Some(v) = number_of(map, "resY") {
        params.res_y = v;
    }
    if let Some(v) = number_of(map, "rotationState") {
        params.rotation_state = v;
    }
    if let Some(v) = number_of(map, "brightness") {
        params.brightness = v;
    }
    if let Some(v) = number_of(map, "contrast") {
        params.contrast = v;
    }
    if let Some(v) = number_of(map, "saturation") {
        params.saturation = v;
    }
    if let Some(v) = number_of(map, "opacity") {
        params.opacity = v;
    }

    if let Some(AttributeValue::S(format)) = map.get("outputFormat") {
        match OutputFormat::parse(format) {
            Some(parsed) => params.output_format = parsed,
            None => warn!(
                upload_id = %upload_id,
                format = %format,
                "Unknown output format in record, using default"
            ),
        }
    }

    params
}

fn number(value: impl ToString) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

fn number_of<T: std::str::FromStr>(map: &Item, name: &str) -> Option<T> {
    match map.get(name) {
        Some(AttributeValue::N(n)) => n.parse().ok(),
        _ => None,
    }
}

fn string_list(values: &[String]) -> AttributeValue {
    AttributeValue::L(values.iter().cloned().map(AttributeValue::S).collect())
}

fn strings_of(values: &[AttributeValue]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            AttributeValue::S(s) => Some(s.clone()),
            _ => None,
        })
        .collect()
}

fn override_to_attr(value: &FilenameOverride) -> AttributeValue {
    match value {
        FilenameOverride::Single(name) => AttributeValue::S(name.clone()),
        FilenameOverride::PerImage(names) => string_list(names),
    }
}

/// Create a DynamoDB client with optional custom endpoint (DynamoDB Local, etc.).
pub async fn create_dynamodb_client(endpoint_url: Option<&str>, region: &str) -> Client {
    let region = aws_config::Region::new(region.to_string());
    let mut config_loader =
        aws_config::defaults(aws_config::BehaviorVersion::latest()).region(region);

    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }

    let sdk_config = config_loader.load().await;
    Client::new(&sdk_config)
}
