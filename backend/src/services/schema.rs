use crate::error::StoreError;
use crate::services::store::DestinationStore;
use log::info;
use serde::Serialize;

pub const DAILY_METRICS: &str = "Daily_Metrics";
pub const VIDEO_MASTER: &str = "Video_Master";
pub const VIDEO_TAXONOMY: &str = "Video_Taxonomy";
pub const CONTENT_PILLARS: &str = "Content_Pillars";
pub const SUMMARY: &str = "Summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Time series: rows accumulate run after run, duplicates included.
    Append,
    /// Snapshot: data rows always hold exactly the latest run.
    ReplaceAll,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    pub name: String,
    pub mode: WriteMode,
    pub headers: Vec<String>,
}

impl TableSchema {
    pub fn new(name: &str, mode: WriteMode, headers: &[&str]) -> Self {
        TableSchema {
            name: name.to_string(),
            mode,
            headers: headers.iter().map(|h| h.to_string()).collect(),
        }
    }
}

/// Declared destination tables.
#[derive(Debug, Clone, Serialize)]
pub struct SheetCatalog {
    pub tables: Vec<TableSchema>,
}

impl SheetCatalog {
    pub fn get(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.name == name)
    }
}

impl Default for SheetCatalog {
    fn default() -> Self {
        SheetCatalog {
            tables: vec![
                TableSchema::new(
                    DAILY_METRICS,
                    WriteMode::Append,
                    &[
                        "date",
                        "views",
                        "watch_time_minutes",
                        "avg_view_duration",
                        "subscribers_gained",
                        "subscribers_lost",
                        "likes",
                        "comments",
                        "shares",
                        "extracted_at",
                    ],
                ),
                TableSchema::new(
                    VIDEO_MASTER,
                    WriteMode::ReplaceAll,
                    &[
                        "video_id",
                        "title",
                        "publish_date",
                        "duration_seconds",
                        "category",
                        "thumbnail_url",
                        "tags",
                        "description_snippet",
                        "view_count",
                        "like_count",
                        "comment_count",
                        "views_7d",
                        "watch_time_7d",
                        "avg_view_duration",
                        "avg_view_percentage",
                        "retention_rate",
                        "engagement_rate",
                        "performance_score",
                        "performance_tier",
                        "content_pillar",
                        "last_updated",
                    ],
                ),
                TableSchema::new(
                    VIDEO_TAXONOMY,
                    WriteMode::ReplaceAll,
                    &[
                        "video_id",
                        "title",
                        "primary_topic",
                        "secondary_topics",
                        "hook_type",
                        "content_format",
                        "cta_presence",
                        "publication_day",
                    ],
                ),
                TableSchema::new(
                    CONTENT_PILLARS,
                    WriteMode::ReplaceAll,
                    &[
                        "content_pillar",
                        "video_count",
                        "total_views",
                        "avg_views",
                        "avg_engagement_rate",
                        "avg_view_duration",
                        "updated_at",
                    ],
                ),
                TableSchema::new(SUMMARY, WriteMode::ReplaceAll, &["metric", "value"]),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaAction {
    Created,
    Recreated,
    Unchanged,
}

pub struct SchemaManager<'a> {
    store: &'a dyn DestinationStore,
}

impl<'a> SchemaManager<'a> {
    pub fn new(store: &'a dyn DestinationStore) -> Self {
        SchemaManager { store }
    }

    /// Makes the table's header equal `declared`.
    ///
    /// A drifted header wipes the table, data rows included.
    pub async fn ensure_schema(
        &self,
        table: &str,
        declared: &[String],
    ) -> Result<SchemaAction, StoreError> {
        match self.store.read_header(table).await? {
            None => {
                self.store.create_table(table, declared).await?;
                info!("Created table '{table}' with {} columns", declared.len());
                Ok(SchemaAction::Created)
            }
            Some(header) if header == declared => Ok(SchemaAction::Unchanged),
            Some(header) => {
                info!(
                    "Schema drift on '{table}': found [{}], expected [{}]. Recreating table, existing rows are dropped.",
                    header.join(", "),
                    declared.join(", ")
                );
                self.store.reset_table(table, declared).await?;
                Ok(SchemaAction::Recreated)
            }
        }
    }

    pub async fn ensure_table(&self, schema: &TableSchema) -> Result<SchemaAction, StoreError> {
        self.ensure_schema(&schema.name, &schema.headers).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Cell;
    use crate::services::store::InMemoryStore;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn missing_table_is_created_with_header_only() {
        let store = InMemoryStore::new();
        let manager = SchemaManager::new(&store);

        let action = manager.ensure_schema("T", &headers(&["a", "b"])).await.unwrap();

        assert_eq!(action, SchemaAction::Created);
        assert_eq!(store.raw("T").unwrap(), vec![vec![Cell::text("a"), Cell::text("b")]]);
    }

    #[tokio::test]
    async fn second_call_is_a_no_op() {
        let store = InMemoryStore::new();
        let manager = SchemaManager::new(&store);
        let declared = headers(&["a", "b"]);

        manager.ensure_schema("T", &declared).await.unwrap();
        store.append_rows("T", &[vec![Cell::Int(1), Cell::Int(2)]]).await.unwrap();
        let before = store.raw("T").unwrap();

        let action = manager.ensure_schema("T", &declared).await.unwrap();

        assert_eq!(action, SchemaAction::Unchanged);
        assert_eq!(store.raw("T").unwrap(), before);
    }

    #[tokio::test]
    async fn drifted_header_recreates_the_table() {
        let store = InMemoryStore::new();
        store.insert_raw(
            "T",
            vec![
                vec![Cell::text("b"), Cell::text("a")],
                vec![Cell::Int(1), Cell::Int(2)],
            ],
        );
        let manager = SchemaManager::new(&store);

        let action = manager.ensure_schema("T", &headers(&["a", "b"])).await.unwrap();

        assert_eq!(action, SchemaAction::Recreated);
        assert_eq!(store.raw("T").unwrap(), vec![vec![Cell::text("a"), Cell::text("b")]]);
    }

    #[tokio::test]
    async fn extra_or_missing_columns_count_as_drift() {
        let store = InMemoryStore::new();
        store.insert_raw("T", vec![vec![Cell::text("a")]]);
        let manager = SchemaManager::new(&store);
        assert_eq!(
            manager.ensure_schema("T", &headers(&["a", "b"])).await.unwrap(),
            SchemaAction::Recreated
        );
        assert_eq!(
            manager.ensure_schema("T", &headers(&["a"])).await.unwrap(),
            SchemaAction::Recreated
        );
    }

    #[test]
    fn default_catalog_declares_every_table_once() {
        let catalog = SheetCatalog::default();
        let names: Vec<&str> = catalog.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![DAILY_METRICS, VIDEO_MASTER, VIDEO_TAXONOMY, CONTENT_PILLARS, SUMMARY]
        );
        assert_eq!(catalog.get(DAILY_METRICS).unwrap().mode, WriteMode::Append);
        assert_eq!(catalog.get(VIDEO_MASTER).unwrap().mode, WriteMode::ReplaceAll);
        assert_eq!(catalog.get(SUMMARY).unwrap().mode, WriteMode::ReplaceAll);
        assert!(catalog.get("Nope").is_none());
    }
}
