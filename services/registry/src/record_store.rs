use crate::config::StoreConfig;
use crate::patient::PatientRecord;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::Builder as DynamoConfigBuilder;
use aws_sdk_dynamodb::operation::put_item::builders::PutItemFluentBuilder;
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client as DynamoClient;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, instrument};

// Attribute names of the patients table, shared with the analyzer
const ATTR_ID: &str = "pacienteId";
const ATTR_NAME: &str = "nome";
const ATTR_AGE: &str = "idade";
const ATTR_HISTORY: &str = "historico";
const ATTR_STATUS: &str = "status";
const ATTR_CREATED_AT: &str = "criadoEm";
const ATTR_RISK: &str = "risco";
const ATTR_SCORE: &str = "score";

/// Point reads and writes of patient records by id
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record, `None` when the id is unknown
    async fn get(&self, id: &str) -> Result<Option<PatientRecord>>;

    /// Persist a new record under its id; an existing id is an error
    async fn put(&self, record: &PatientRecord) -> Result<()>;
}

/// Patient records in a DynamoDB table keyed by `pacienteId`
pub struct DynamoDbRecordStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoDbRecordStore {
    /// Create a new store from the shared AWS configuration chain
    pub async fn new(config: &StoreConfig) -> Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut dynamo_config_builder = DynamoConfigBuilder::from(&aws_config);

        // Configure custom endpoint for LocalStack/DynamoDB Local
        if let Some(ref endpoint_url) = config.endpoint_url {
            dynamo_config_builder = dynamo_config_builder.endpoint_url(endpoint_url);
        }

        let client = DynamoClient::from_conf(dynamo_config_builder.build());

        info!(
            table = %config.table_name,
            region = %config.region,
            "DynamoDB record store initialized"
        );

        Ok(Self::with_client(client, &config.table_name))
    }

    pub fn with_client(client: DynamoClient, table_name: &str) -> Self {
        Self {
            client,
            table_name: table_name.to_string(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// PutItem for a new record, refused by DynamoDB if the id is taken
    fn put_request(&self, record: &PatientRecord) -> PutItemFluentBuilder {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(record_to_item(record)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", ATTR_ID)
    }
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<PatientRecord>> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(ATTR_ID, AttributeValue::S(id.to_string()))
            .send()
            .await
            .context("Failed to get patient record")?;

        output.item().map(item_to_record).transpose()
    }

    #[instrument(skip(self, record), fields(patient_id = %record.id))]
    async fn put(&self, record: &PatientRecord) -> Result<()> {
        self.put_request(record)
            .send()
            .await
            .context("Failed to put patient record")?;

        debug!(table = %self.table_name, "Patient record stored");

        Ok(())
    }
}

/// Map a record onto table attributes. Analyzer fields are never written here.
fn record_to_item(record: &PatientRecord) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::from([
        (ATTR_ID.to_string(), AttributeValue::S(record.id.clone())),
        (ATTR_AGE.to_string(), AttributeValue::N(record.age.to_string())),
        (ATTR_HISTORY.to_string(), AttributeValue::S(record.history.clone())),
        (ATTR_STATUS.to_string(), AttributeValue::S(record.status.clone())),
        (ATTR_CREATED_AT.to_string(), AttributeValue::S(record.created_at.clone())),
    ]);
    if let Some(ref name) = record.name {
        item.insert(ATTR_NAME.to_string(), AttributeValue::S(name.clone()));
    }
    item
}

fn item_to_record(item: &HashMap<String, AttributeValue>) -> Result<PatientRecord> {
    let id = string_attr(item, ATTR_ID)?.ok_or_else(|| anyhow!("item has no {ATTR_ID}"))?;
    let status = string_attr(item, ATTR_STATUS)?.ok_or_else(|| anyhow!("item {id} has no {ATTR_STATUS}"))?;

    Ok(PatientRecord {
        name: string_attr(item, ATTR_NAME)?,
        age: number_attr(item, ATTR_AGE)?.unwrap_or_default(),
        history: string_attr(item, ATTR_HISTORY)?.unwrap_or_default(),
        created_at: string_attr(item, ATTR_CREATED_AT)?.unwrap_or_default(),
        // Analyzer output is passed through; a value of the wrong type is skipped
        risk: item.get(ATTR_RISK).and_then(|v| v.as_s().ok()).cloned(),
        score: item.get(ATTR_SCORE).and_then(|v| v.as_n().ok()).cloned(),
        id,
        status,
    })
}

fn string_attr(item: &HashMap<String, AttributeValue>, name: &str) -> Result<Option<String>> {
    match item.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_s()
            .map(|s| Some(s.clone()))
            .map_err(|_| anyhow!("attribute {name} is not a string")),
    }
}

fn number_attr<T: std::str::FromStr>(
    item: &HashMap<String, AttributeValue>,
    name: &str,
) -> Result<Option<T>> {
    match item.get(name) {
        None => Ok(None),
        Some(value) => {
            let raw = value
                .as_n()
                .map_err(|_| anyhow!("attribute {name} is not a number"))?;
            raw.parse()
                .map(Some)
                .map_err(|_| anyhow!("attribute {name} has unparseable value {raw}"))
        }
    }
}

/// Process-local store for development runs and tests
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: RwLock<HashMap<String, PatientRecord>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record directly, standing in for the analyzer
    pub fn seed(&self, record: PatientRecord) {
        self.write_lock().insert(record.id.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.read_lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read_lock(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, PatientRecord>> {
        self.records.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_lock(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, PatientRecord>> {
        self.records.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, id: &str) -> Result<Option<PatientRecord>> {
        Ok(self.read_lock().get(id).cloned())
    }

    async fn put(&self, record: &PatientRecord) -> Result<()> {
        let mut records = self.write_lock();
        if records.contains_key(&record.id) {
            return Err(anyhow!("patient record {} already exists", record.id));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patient::{PatientRequest, STATUS_PENDING};

    fn test_record() -> PatientRecord {
        PatientRecord::register(PatientRequest {
            name: Some("Maria".to_string()),
            age: 47,
            history: Some("Sim".to_string()),
        })
    }

    #[test]
    fn test_record_to_item_attributes() {
        let record = test_record();
        let item = record_to_item(&record);

        assert_eq!(item.len(), 6);
        assert_eq!(item[ATTR_ID], AttributeValue::S(record.id.clone()));
        assert_eq!(item[ATTR_AGE], AttributeValue::N("47".to_string()));
        assert_eq!(item[ATTR_STATUS], AttributeValue::S(STATUS_PENDING.to_string()));
        assert!(!item.contains_key(ATTR_RISK));
        assert!(!item.contains_key(ATTR_SCORE));
    }

    #[test]
    fn test_item_round_trips_with_analyzer_fields() {
        let record = test_record();
        let mut item = record_to_item(&record);
        item.insert(ATTR_RISK.to_string(), AttributeValue::S("MEDIO".to_string()));
        item.insert(ATTR_SCORE.to_string(), AttributeValue::N("0.55".to_string()));

        let parsed = item_to_record(&item).unwrap();
        assert_eq!(parsed.id, record.id);
        assert_eq!(parsed.name.as_deref(), Some("Maria"));
        assert_eq!(parsed.age, 47);
        assert_eq!(parsed.risk.as_deref(), Some("MEDIO"));
        assert_eq!(parsed.score.as_deref(), Some("0.55"));
    }

    #[test]
    fn test_item_keeps_score_digits() {
        let mut item = record_to_item(&test_record());
        item.insert(
            ATTR_SCORE.to_string(),
            AttributeValue::N("0.12345678901234567890123".to_string()),
        );

        let parsed = item_to_record(&item).unwrap();
        assert_eq!(parsed.score.as_deref(), Some("0.12345678901234567890123"));
    }

    #[test]
    fn test_item_keeps_present_empty_name() {
        let mut item = record_to_item(&test_record());
        item.insert(ATTR_NAME.to_string(), AttributeValue::S(String::new()));
        assert_eq!(item_to_record(&item).unwrap().name.as_deref(), Some(""));

        item.remove(ATTR_NAME);
        assert_eq!(item_to_record(&item).unwrap().name, None);
    }

    #[test]
    fn test_item_without_status_is_rejected() {
        let mut item = record_to_item(&test_record());
        item.remove(ATTR_STATUS);
        assert!(item_to_record(&item).is_err());
    }

    #[test]
    fn test_mistyped_analyzer_fields_are_omitted() {
        let mut item = record_to_item(&test_record());
        item.insert(ATTR_SCORE.to_string(), AttributeValue::S("0.85".to_string()));
        item.insert(ATTR_RISK.to_string(), AttributeValue::N("2".to_string()));

        let parsed = item_to_record(&item).unwrap();
        assert_eq!(parsed.score, None);
        assert_eq!(parsed.risk, None);
        assert_eq!(parsed.status, STATUS_PENDING);
    }

    #[test]
    fn test_put_request_refuses_existing_id() {
        let client = DynamoClient::from_conf(
            aws_sdk_dynamodb::Config::builder()
                .behavior_version(BehaviorVersion::latest())
                .region(aws_config::Region::new("us-east-1"))
                .build(),
        );
        let store = DynamoDbRecordStore::with_client(client, "patients");
        let request = store.put_request(&test_record());

        assert_eq!(
            request.get_condition_expression().as_deref(),
            Some("attribute_not_exists(#id)")
        );
        assert_eq!(
            request
                .get_expression_attribute_names()
                .as_ref()
                .and_then(|names| names.get("#id"))
                .map(String::as_str),
            Some(ATTR_ID)
        );
        assert_eq!(request.get_table_name().as_deref(), Some("patients"));
    }

    #[test]
    fn test_in_memory_put_and_get() {
        let store = InMemoryRecordStore::new();
        let record = test_record();

        tokio_test::block_on(store.put(&record)).unwrap();

        assert_eq!(store.len(), 1);
        let fetched = tokio_test::block_on(store.get(&record.id)).unwrap();
        assert_eq!(fetched, Some(record));
        assert_eq!(tokio_test::block_on(store.get("missing")).unwrap(), None);
    }

    #[test]
    fn test_in_memory_put_never_overwrites() {
        let store = InMemoryRecordStore::new();
        let record = test_record();
        tokio_test::block_on(store.put(&record)).unwrap();

        let mut changed = record.clone();
        changed.status = "CONCLUIDO".to_string();
        assert!(tokio_test::block_on(store.put(&changed)).is_err());

        let fetched = tokio_test::block_on(store.get(&record.id)).unwrap().unwrap();
        assert_eq!(fetched.status, STATUS_PENDING);
    }
}
