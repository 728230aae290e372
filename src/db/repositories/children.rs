use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::params;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{
        connection::Database,
        helpers::{decode_value, encode_value},
    },
    remote::{ChildRecord, KeyPath, RemoteStore},
};

impl Database {
    /// Append a child under `parent_path` with a fresh key and return that key.
    pub async fn insert_child(&self, parent_path: &str, value: &Value) -> Result<String> {
        let parent_path = parent_path.to_string();
        let value_json = encode_value(value)?;
        self.execute(move |conn| {
            let child_key = Uuid::new_v4().simple().to_string();
            conn.execute(
                "INSERT INTO children (parent_path, child_key, value_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![parent_path, child_key, value_json, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to insert child under {parent_path}"))?;
            Ok(child_key)
        })
        .await
    }

    /// Children of `parent_path` in insertion order.
    pub async fn list_children(&self, parent_path: &str) -> Result<Vec<ChildRecord>> {
        let parent_path = parent_path.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT child_key, value_json
                 FROM children
                 WHERE parent_path = ?1
                 ORDER BY rowid ASC",
            )?;

            let mut rows = stmt.query(params![parent_path])?;
            let mut children = Vec::new();
            while let Some(row) = rows.next()? {
                children.push(ChildRecord::new(
                    row.get::<_, String>(0)?,
                    decode_value(row.get(1)?),
                ));
            }

            Ok(children)
        })
        .await
    }
}

#[async_trait]
impl RemoteStore for Database {
    async fn read_children(&self, path: &KeyPath) -> Result<Vec<ChildRecord>> {
        self.list_children(&path.to_string()).await
    }

    async fn push_child(&self, path: &KeyPath, value: Value) -> Result<String> {
        self.insert_child(&path.to_string(), &value).await
    }
}
