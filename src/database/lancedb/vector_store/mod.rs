
use super::{ChunkRecord, sql_literal};
use crate::PolicyError;
use crate::documents::PolicyMetadata;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const TABLE_NAME: &str = "policy_chunks";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    path: PathBuf,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub filename: String,
    pub chunk_index: u32,
    pub text: String,
    pub metadata: PolicyMetadata,
    pub source_path: String,
    /// Cosine distance to the query, lower is closer
    pub distance: f32,
}

impl VectorStore {
    /// Open (creating if needed) the LanceDB dataset directory at `path`.
    ///
    /// The chunk table itself is created on the first upsert, once the vector
    /// dimension is known.
    #[inline]
    pub async fn open(path: &Path) -> Result<Self, PolicyError> {
        debug!("Initializing LanceDB at path: {:?}", path);

        std::fs::create_dir_all(path).map_err(|e| {
            PolicyError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = path.to_string_lossy().to_string();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        info!("Vector store opened at {}", path.display());
        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
            path: path.to_path_buf(),
        })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn table_exists(&self) -> Result<bool, PolicyError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    /// The chunk table, or `None` before anything was ingested
    async fn open_table(&self) -> Result<Option<Table>, PolicyError> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to open table: {}", e)))?;

        Ok(Some(table))
    }

    /// Vector dimension of the existing table
    #[inline]
    pub async fn vector_dimension(&self) -> Result<Option<usize>, PolicyError> {
        let Some(table) = self.open_table().await? else {
            return Ok(None);
        };

        let schema = table
            .schema()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(PolicyError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("filename", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("char_count", DataType::UInt32, false),
            Field::new("start_char", DataType::UInt32, false),
            Field::new("end_char", DataType::UInt32, false),
            Field::new("text", DataType::Utf8, false),
            Field::new("department", DataType::Utf8, false),
            Field::new("region", DataType::Utf8, false),
            Field::new("policy_type", DataType::Utf8, false),
            Field::new("effective_date", DataType::Utf8, false),
            Field::new("description", DataType::Utf8, false),
            Field::new("source_path", DataType::Utf8, false),
            Field::new("ingested_at", DataType::Utf8, false),
        ]))
    }

    /// Make sure a table exists whose vectors have `vector_dim` dimensions
    async fn ensure_table(&self, vector_dim: usize) -> Result<(), PolicyError> {
        match self.vector_dimension().await? {
            Some(existing) if existing == vector_dim => return Ok(()),
            Some(existing) => {
                warn!(
                    "Vector dimension changed from {} to {}, recreating table; previously indexed documents must be ingested again",
                    existing, vector_dim
                );
                self.drop_table().await?;
            }
            None => {
                info!("Creating {} table with {} dimensions", self.table_name, vector_dim);
            }
        }

        self.connection
            .create_empty_table(&self.table_name, Self::create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to create table: {}", e)))?;

        Ok(())
    }

    /// Insert or replace records keyed by id
    #[inline]
    pub async fn upsert(&self, records: &[ChunkRecord]) -> Result<usize, PolicyError> {
        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(0);
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(PolicyError::Database("Cannot store empty vectors".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(PolicyError::Database(format!(
                "Record {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        self.ensure_table(vector_dim).await?;

        let table = self.open_table().await?.ok_or_else(|| {
            PolicyError::Database(format!("Table {} disappeared", self.table_name))
        })?;

        let record_batch = Self::create_record_batch(records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge_insert = table.merge_insert(&["id"]);
        merge_insert
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge_insert
            .execute(Box::new(reader))
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to upsert chunks: {}", e)))?;

        debug!("Upserted {} records", records.len());
        Ok(records.len())
    }

    /// Create a RecordBatch from chunk records
    fn create_record_batch(
        records: &[ChunkRecord],
        vector_dim: usize,
    ) -> Result<RecordBatch, PolicyError> {
        let mut flat_values = Vec::with_capacity(records.len() * vector_dim);
        for record in records {
            flat_values.extend_from_slice(&record.vector);
        }
        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    PolicyError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let strings = |get: fn(&ChunkRecord) -> &str| -> Arc<dyn Array> {
            Arc::new(StringArray::from(
                records.iter().map(get).collect::<Vec<&str>>(),
            ))
        };
        let numbers = |get: fn(&ChunkRecord) -> u32| -> Arc<dyn Array> {
            Arc::new(UInt32Array::from(
                records.iter().map(get).collect::<Vec<u32>>(),
            ))
        };

        let arrays: Vec<Arc<dyn Array>> = vec![
            strings(|r| r.id.as_str()),
            Arc::new(vector_array),
            strings(|r| r.filename.as_str()),
            numbers(|r| r.chunk_index),
            numbers(|r| r.char_count),
            numbers(|r| r.start_char),
            numbers(|r| r.end_char),
            strings(|r| r.text.as_str()),
            strings(|r| r.metadata.department.as_str()),
            strings(|r| r.metadata.region.as_str()),
            strings(|r| r.metadata.policy_type.as_str()),
            strings(|r| r.metadata.effective_date.as_str()),
            strings(|r| r.metadata.description.as_str()),
            strings(|r| r.source_path.as_str()),
            strings(|r| r.ingested_at.as_str()),
        ];

        RecordBatch::try_new(Self::create_schema(vector_dim), arrays)
            .map_err(|e| PolicyError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Nearest neighbours of `query_vector` by cosine distance, closest first
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        predicate: Option<&str>,
    ) -> Result<Vec<SearchResult>, PolicyError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_table().await? else {
            debug!("Search on an empty index");
            return Ok(Vec::new());
        };

        debug!("Searching for similar vectors with limit: {}", limit);

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| PolicyError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }

        let mut stream = query
            .execute()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(Self::parse_search_batch(&batch)?);
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(limit);

        debug!("Search returned {} results", results.len());
        Ok(results)
    }

    /// Parse a single record batch from search results
    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>, PolicyError> {
        let ids = string_column(batch, "id")?;
        let filenames = string_column(batch, "filename")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let texts = string_column(batch, "text")?;
        let departments = string_column(batch, "department")?;
        let regions = string_column(batch, "region")?;
        let policy_types = string_column(batch, "policy_type")?;
        let effective_dates = string_column(batch, "effective_date")?;
        let descriptions = string_column(batch, "description")?;
        let source_paths = string_column(batch, "source_path")?;
        let distances = batch
            .column_by_name("_distance")
            .and_then(|col| col.as_any().downcast_ref::<Float32Array>())
            .ok_or_else(|| PolicyError::Database("Missing _distance column".to_string()))?;

        Ok((0..batch.num_rows())
            .map(|row| SearchResult {
                id: ids.value(row).to_string(),
                filename: filenames.value(row).to_string(),
                chunk_index: chunk_indices.value(row),
                text: texts.value(row).to_string(),
                metadata: PolicyMetadata {
                    department: departments.value(row).to_string(),
                    region: regions.value(row).to_string(),
                    policy_type: policy_types.value(row).to_string(),
                    effective_date: effective_dates.value(row).to_string(),
                    description: descriptions.value(row).to_string(),
                },
                source_path: source_paths.value(row).to_string(),
                distance: if distances.is_null(row) {
                    f32::MAX
                } else {
                    distances.value(row)
                },
            })
            .collect())
    }

    /// Read the named columns of every row matching `predicate`
    async fn scan(
        &self,
        columns: &[&str],
        predicate: Option<&str>,
    ) -> Result<Vec<RecordBatch>, PolicyError> {
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let mut query = table.query().select(Select::Columns(
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }

        query
            .execute()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to execute scan: {}", e)))?
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to read scan results: {}", e)))
    }

    /// Chunk indices and ids stored for `filename`, ordered by index
    #[inline]
    pub async fn chunk_ids(&self, filename: &str) -> Result<Vec<(u32, String)>, PolicyError> {
        let predicate = format!("filename = {}", sql_literal(filename));
        let batches = self.scan(&["id", "chunk_index"], Some(&predicate)).await?;

        let mut ids = Vec::new();
        for batch in &batches {
            let id_column = string_column(batch, "id")?;
            let index_column = u32_column(batch, "chunk_index")?;
            for row in 0..batch.num_rows() {
                ids.push((index_column.value(row), id_column.value(row).to_string()));
            }
        }

        ids.sort();
        Ok(ids)
    }

    /// Every value of a string column with the number of rows holding it
    #[inline]
    pub async fn value_counts(&self, column: &str) -> Result<BTreeMap<String, usize>, PolicyError> {
        let batches = self.scan(&[column], None).await?;

        let mut counts = BTreeMap::new();
        for batch in &batches {
            let values = string_column(batch, column)?;
            for row in 0..batch.num_rows() {
                *counts.entry(values.value(row).to_string()).or_insert(0) += 1;
            }
        }

        Ok(counts)
    }

    /// Delete all rows matching `predicate`
    #[inline]
    pub async fn delete(&self, predicate: &str) -> Result<(), PolicyError> {
        let Some(table) = self.open_table().await? else {
            return Ok(());
        };

        debug!("Deleting rows where {}", predicate);
        table
            .delete(predicate)
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to delete rows: {}", e)))?;

        Ok(())
    }

    /// Number of rows, optionally restricted by `predicate`
    #[inline]
    pub async fn count_rows(&self, predicate: Option<String>) -> Result<usize, PolicyError> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table
            .count_rows(predicate)
            .await
            .map_err(|e| PolicyError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Drop the chunk table if it exists
    #[inline]
    pub async fn drop_table(&self) -> Result<(), PolicyError> {
        if self.table_exists().await? {
            info!("Dropping {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| PolicyError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, PolicyError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PolicyError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| PolicyError::Database(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array, PolicyError> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PolicyError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| PolicyError::Database(format!("Invalid {} column type", name)))
}
