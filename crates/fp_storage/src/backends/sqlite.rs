use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use fp_core::{
    ArticleList, ArticleRecord, ContentRepository, Error, ImageRef, ItemId, ItemQuery, ListId, ListOptions,
    ListStorage, PreviewMarker, RawItem, Result, VersionGate,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use tracing::{info, warn};

use super::memory::newest_first;

const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS lists (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL,
        options TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS list_versions (
        list_id INTEGER NOT NULL REFERENCES lists(id),
        version INTEGER NOT NULL,
        articles TEXT NOT NULL,
        saved_at TEXT NOT NULL,
        PRIMARY KEY (list_id, version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS list_previews (
        list_id INTEGER PRIMARY KEY REFERENCES lists(id),
        based_on INTEGER NOT NULL,
        articles TEXT NOT NULL,
        saved_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS list_setups (
        actor TEXT PRIMARY KEY,
        lists TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS items (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        body TEXT NOT NULL,
        permalink TEXT NOT NULL,
        date TEXT NOT NULL,
        author TEXT,
        size INTEGER,
        image TEXT
    )
    "#,
];

fn db_error(context: &str, e: sqlx::Error) -> Error {
    Error::Storage(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
    gate: VersionGate,
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path, gate: VersionGate) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .map_err(|e| db_error("Failed to connect to database", e))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| db_error(&format!("Failed to run migration {}", i), e))?;
        }
        info!("🗄️ SQLite storage ready at {}", db_path.display());

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
            gate,
        })
    }

    pub fn get_db_path(&self) -> &PathBuf {
        &self.db_path
    }

    async fn list_header(&self, id: ListId) -> Result<(String, ListOptions, u64)> {
        let row = sqlx::query("SELECT title, options, version FROM lists WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load list", e))?
            .ok_or_else(|| Error::NotFound(format!("list {}", id)))?;
        let options: ListOptions = serde_json::from_str(&row.get::<String, _>("options"))?;
        Ok((row.get("title"), options, row.get::<i64, _>("version") as u64))
    }

    fn item_from_row(row: &SqliteRow) -> Result<RawItem> {
        let image: Option<String> = row.get("image");
        let image: Option<ImageRef> = image.map(|raw| serde_json::from_str(&raw)).transpose()?;
        Ok(RawItem {
            id: row.get::<i64, _>("id") as ItemId,
            title: row.get("title"),
            body: row.get("body"),
            permalink: row.get("permalink"),
            date: row.get("date"),
            author: row.get("author"),
            size: row.get::<Option<i64>, _>("size").map(|s| s as u32),
            image,
        })
    }
}

#[async_trait]
impl ListStorage for SQLiteStorage {
    async fn create_list(&self, title: &str, options: &ListOptions) -> Result<ArticleList> {
        let result = sqlx::query("INSERT INTO lists (title, options, version) VALUES (?, ?, 0)")
            .bind(title)
            .bind(serde_json::to_string(options)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to create list", e))?;
        let mut list = ArticleList::transient(options.clone());
        list.id = result.last_insert_rowid() as ListId;
        list.title = title.to_string();
        Ok(list)
    }

    async fn get_list(&self, id: ListId, version: Option<u64>) -> Result<ArticleList> {
        let (title, options, stored) = self.list_header(id).await?;
        let version = version.unwrap_or(stored);
        let articles = if version == 0 {
            Vec::new()
        } else {
            let row = sqlx::query("SELECT articles FROM list_versions WHERE list_id = ? AND version = ?")
                .bind(id as i64)
                .bind(version as i64)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| db_error("Failed to load list version", e))?
                .ok_or_else(|| Error::NotFound(format!("version {} of list {}", version, id)))?;
            serde_json::from_str(&row.get::<String, _>("articles"))?
        };
        Ok(ArticleList {
            id,
            title,
            version,
            articles,
            options,
            preview: false,
        })
    }

    async fn stored_version(&self, id: ListId) -> Result<u64> {
        Ok(self.list_header(id).await?.2)
    }

    async fn store_version(&self, id: ListId, articles: &[ArticleRecord], expected: Option<u64>) -> Result<u64> {
        let mut tx = self.pool.begin().await.map_err(|e| db_error("Failed to begin", e))?;

        // The version bump is the compare-and-swap; a stale caller updates no row.
        let bumped = match expected {
            Some(known) => sqlx::query(
                "UPDATE lists SET version = version + 1 WHERE id = ? AND version <= ? RETURNING version",
            )
            .bind(id as i64)
            .bind(i64::try_from(known.saturating_add(self.gate.tolerance)).unwrap_or(i64::MAX)),
            None => sqlx::query("UPDATE lists SET version = version + 1 WHERE id = ? RETURNING version")
                .bind(id as i64),
        }
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| db_error("Failed to bump version", e))?;

        let Some(row) = bumped else {
            drop(tx);
            let stored = self.stored_version(id).await?;
            let known = expected.unwrap_or_default();
            warn!("⚠️ Rejected save of list {} based on version {} (stored {})", id, known, stored);
            return Err(Error::VersionConflict { list_id: id, known, stored });
        };
        let version = row.get::<i64, _>("version") as u64;

        sqlx::query("INSERT INTO list_versions (list_id, version, articles, saved_at) VALUES (?, ?, ?, ?)")
            .bind(id as i64)
            .bind(version as i64)
            .bind(serde_json::to_string(articles)?)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| db_error("Failed to store list version", e))?;

        tx.commit().await.map_err(|e| db_error("Failed to commit", e))?;
        Ok(version)
    }

    async fn store_preview(&self, id: ListId, articles: &[ArticleRecord]) -> Result<PreviewMarker> {
        let based_on = self.stored_version(id).await?;
        let marker = PreviewMarker {
            list_id: id,
            based_on,
            saved_at: Utc::now(),
        };
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO list_previews (list_id, based_on, articles, saved_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(id as i64)
        .bind(based_on as i64)
        .bind(serde_json::to_string(articles)?)
        .bind(marker.saved_at.to_rfc3339())
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store preview", e))?;
        Ok(marker)
    }

    async fn get_preview(&self, id: ListId) -> Result<Option<ArticleList>> {
        let (title, options, _) = self.list_header(id).await?;
        let row = sqlx::query("SELECT based_on, articles FROM list_previews WHERE list_id = ?")
            .bind(id as i64)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load preview", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ArticleList {
            id,
            title,
            version: row.get::<i64, _>("based_on") as u64,
            articles: serde_json::from_str(&row.get::<String, _>("articles"))?,
            options,
            preview: true,
        }))
    }

    async fn get_setup(&self, actor: &str) -> Result<Vec<ListId>> {
        let row = sqlx::query("SELECT lists FROM list_setups WHERE actor = ?")
            .bind(actor)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load list setup", e))?;
        match row {
            Some(row) => Ok(serde_json::from_str(&row.get::<String, _>("lists"))?),
            None => Ok(Vec::new()),
        }
    }

    async fn put_setup(&self, actor: &str, lists: &[ListId]) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO list_setups (actor, lists) VALUES (?, ?)")
            .bind(actor)
            .bind(serde_json::to_string(lists)?)
            .execute(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to store list setup", e))?;
        Ok(())
    }
}

#[async_trait]
impl ContentRepository for SQLiteStorage {
    async fn store_item(&self, item: &RawItem) -> Result<()> {
        let image = item.image.as_ref().map(serde_json::to_string).transpose()?;
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO items
            (id, title, body, permalink, date, author, size, image)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(item.id as i64)
        .bind(&item.title)
        .bind(&item.body)
        .bind(&item.permalink)
        .bind(&item.date)
        .bind(item.author.as_deref())
        .bind(item.size.map(i64::from))
        .bind(image)
        .execute(&*self.pool)
        .await
        .map_err(|e| db_error("Failed to store item", e))?;
        Ok(())
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<RawItem>> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id as i64)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to load item", e))?;
        row.as_ref().map(Self::item_from_row).transpose()
    }

    async fn query_items(&self, query: &ItemQuery) -> Result<Vec<RawItem>> {
        let rows = sqlx::query("SELECT * FROM items")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| db_error("Failed to query items", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            let item = Self::item_from_row(row)?;
            if query.matches(&item) {
                items.push(item);
            }
        }
        items.sort_by(newest_first);
        Ok(items
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn item(id: ItemId) -> RawItem {
        RawItem {
            id,
            title: format!("Item {}", id),
            body: "Body".to_string(),
            permalink: format!("https://example.com/{}", id),
            date: format!("2024-01-0{} 12:00:00", id),
            author: Some("ana".to_string()),
            size: None,
            image: Some(ImageRef { attachment: 90 + id, url: format!("https://cdn.example.com/{}.jpg", id) }),
        }
    }

    #[tokio::test]
    async fn test_sqlite_versioning() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path, VersionGate::default()).await.unwrap();

        let list = storage.create_list("Front", &ListOptions::default()).await.unwrap();
        assert_eq!(storage.store_version(list.id, &[], Some(0)).await.unwrap(), 1);
        let err = storage.store_version(list.id, &[], Some(0)).await.unwrap_err();
        assert!(matches!(err, Error::VersionConflict { known: 0, stored: 1, .. }));

        storage.store_preview(list.id, &[]).await.unwrap();
        assert_eq!(storage.stored_version(list.id).await.unwrap(), 1);
        assert!(storage.get_preview(list.id).await.unwrap().unwrap().preview);

        assert!(matches!(storage.store_version(99, &[], Some(0)).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_sqlite_admits_very_large_known_version() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("large.db"), VersionGate::new(3))
            .await
            .unwrap();
        let list = storage.create_list("Front", &ListOptions::default()).await.unwrap();
        assert_eq!(storage.store_version(list.id, &[], Some(u64::MAX)).await.unwrap(), 1);
        assert_eq!(storage.store_version(list.id, &[], Some(i64::MAX as u64 + 1)).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_items_and_setup() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("items.db"), VersionGate::default())
            .await
            .unwrap();
        for id in 1..=3 {
            storage.store_item(&item(id)).await.unwrap();
        }
        let items = storage.query_items(&ItemQuery { limit: Some(2), ..Default::default() }).await.unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![3, 2]);
        assert_eq!(storage.get_item(1).await.unwrap().unwrap().image.unwrap().attachment, 91);

        storage.put_setup("ana", &[1, 5]).await.unwrap();
        assert_eq!(storage.get_setup("ana").await.unwrap(), vec![1, 5]);
    }
}
