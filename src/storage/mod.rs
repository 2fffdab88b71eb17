//! R2/S3 artifact store: window CSVs are uploaded under a prefix, and the
//! scheduler recovers its resume point by listing them.

use anyhow::{Context, Result};
use s3::creds::Credentials;
use s3::region::Region;
use s3::Bucket;
use tracing::debug;

use crate::config::Config;
use crate::model::ActivityRow;

/// S3 client wrapper scoped to the artifact prefix.
#[derive(Clone)]
pub struct ArtifactStore {
    bucket: Box<Bucket>,
    prefix: String,
}

impl ArtifactStore {
    /// Create a new artifact store from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing from the environment or
    /// client initialization fails.
    pub fn new(config: &Config) -> Result<Self> {
        let access_key = std::env::var("AWS_ACCESS_KEY_ID").context("AWS_ACCESS_KEY_ID not set")?;
        let secret_key =
            std::env::var("AWS_SECRET_ACCESS_KEY").context("AWS_SECRET_ACCESS_KEY not set")?;

        let credentials = Credentials::new(Some(&access_key), Some(&secret_key), None, None, None)
            .context("Failed to create S3 credentials")?;

        let region = if let Some(ref endpoint) = config.s3_endpoint {
            Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            }
        } else {
            config.s3_region.parse().unwrap_or(Region::UsEast1)
        };

        let bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .context("Failed to create S3 bucket")?;

        // Use path-style for custom endpoints (MinIO, R2, etc.)
        let bucket = if config.s3_endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(Self {
            bucket,
            prefix: config.s3_prefix.clone(),
        })
    }

    /// List the window labels of previously uploaded artifacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the list request fails.
    pub async fn list_window_labels(&self) -> Result<Vec<String>> {
        let results = self
            .bucket
            .list(self.prefix.clone(), None)
            .await
            .context("Failed to list artifacts")?;

        let keys: Vec<String> = results
            .into_iter()
            .flat_map(|result| result.contents)
            .map(|object| object.key)
            .collect();

        debug!(count = keys.len(), prefix = %self.prefix, "Listed artifacts");
        Ok(labels_from_keys(&self.prefix, &keys))
    }

    /// Upload one window's CSV artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the upload fails.
    pub async fn upload_window(&self, label: &str, data: &[u8]) -> Result<()> {
        let key = self.window_key(label);
        debug!(key = %key, bytes = data.len(), "Uploading artifact");

        self.bucket
            .put_object_with_content_type(&key, data, "text/csv")
            .await
            .context("Failed to upload artifact")?;

        Ok(())
    }

    fn window_key(&self, label: &str) -> String {
        format!("{}{label}.csv", self.prefix)
    }
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("bucket", &self.bucket.name())
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Strip prefix and extension off object keys, keeping label-shaped names.
fn labels_from_keys(prefix: &str, keys: &[String]) -> Vec<String> {
    keys.iter()
        .filter_map(|key| key.strip_prefix(prefix))
        .filter_map(|name| name.strip_suffix(".csv"))
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Serialize export rows as CSV with the fixed collaborator column order.
#[must_use]
pub fn encode_rows_csv(rows: &[ActivityRow]) -> String {
    let mut out = String::from(
        "window,nickname,identity,account_type,post_count,comment_count,total_activity\n",
    );
    for row in rows {
        out.push_str(&csv_field(&row.window_label));
        out.push(',');
        out.push_str(&csv_field(&row.nickname));
        out.push(',');
        out.push_str(&csv_field(&row.identity));
        out.push(',');
        out.push_str(row.account_type.as_str());
        out.push(',');
        out.push_str(&row.post_count.to_string());
        out.push(',');
        out.push_str(&row.comment_count.to_string());
        out.push(',');
        out.push_str(&row.total_activity.to_string());
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccountType;

    #[test]
    fn test_labels_from_keys() {
        let keys = vec![
            "activity/2025-01-01_09h.csv".to_string(),
            "activity/2025-01-01_10h.csv".to_string(),
            "activity/readme.txt".to_string(),
            "other/2025-01-01_11h.csv".to_string(),
        ];
        let labels = labels_from_keys("activity/", &keys);
        assert_eq!(labels, vec!["2025-01-01_09h", "2025-01-01_10h"]);
    }

    #[test]
    fn test_encode_rows_csv() {
        let rows = vec![ActivityRow {
            window_label: "2025-01-01_09h".to_string(),
            nickname: "Alice".to_string(),
            identity: "alice".to_string(),
            account_type: AccountType::Fixed,
            post_count: 2,
            comment_count: 3,
            total_activity: 5,
        }];
        let csv = encode_rows_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "window,nickname,identity,account_type,post_count,comment_count,total_activity"
        );
        assert_eq!(lines.next().unwrap(), "2025-01-01_09h,Alice,alice,fixed,2,3,5");
    }

    #[test]
    fn test_encode_rows_csv_escapes_fields() {
        let rows = vec![ActivityRow {
            window_label: "w".to_string(),
            nickname: "nick, with \"quotes\"".to_string(),
            identity: "1.2.3.4".to_string(),
            account_type: AccountType::Anonymous,
            post_count: 1,
            comment_count: 0,
            total_activity: 1,
        }];
        let csv = encode_rows_csv(&rows);
        assert!(csv.contains(r#""nick, with ""quotes""""#));
    }

    #[test]
    fn test_encode_empty_rows_is_header_only() {
        let csv = encode_rows_csv(&[]);
        assert_eq!(csv.lines().count(), 1);
    }
}
