//! Spreadsheet import into the roster store

use log::info;

use crate::api::client::RosterClient;
use crate::error::Result;
use crate::roster::cache::{Invalidator, MutationIntent};
use crate::roster::parser::parse_records;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    /// Data rows found in the sheet
    pub parsed: usize,
    /// Records the store reports as created
    pub created: usize,
}

pub struct ImportPipeline<'a> {
    client: &'a dyn RosterClient,
    invalidator: &'a Invalidator,
}

impl<'a> ImportPipeline<'a> {
    pub fn new(client: &'a dyn RosterClient, invalidator: &'a Invalidator) -> Self {
        Self {
            client,
            invalidator,
        }
    }

    /// Parse a workbook and create all its rows in a single call.
    ///
    /// A sheet with no data rows makes no remote call. The bulk create is
    /// sent once and never retried.
    pub async fn submit(&self, bytes: &[u8]) -> Result<ImportReport> {
        let records = parse_records(bytes)?;
        if records.is_empty() {
            info!("Spreadsheet has no data rows, nothing to import");
            return Ok(ImportReport {
                parsed: 0,
                created: 0,
            });
        }

        let created = self.client.create_many(&records).await?;
        info!("Imported {} of {} spreadsheet rows", created, records.len());
        self.invalidator
            .invalidate(MutationIntent::Import { records: created });

        Ok(ImportReport {
            parsed: records.len(),
            created,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RosterError;
    use crate::roster::cache::{CacheStatus, spawn_cache};
    use crate::roster::testing::{Call, MockClient, record};
    use rust_xlsxwriter::Workbook;
    use serde_json::json;
    use std::sync::Arc;

    fn sheet(rows: &[[&str; 2]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "name").unwrap();
        worksheet.write_string(0, 1, "email").unwrap();
        for (i, [name, email]) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            worksheet.write_string(row, 0, *name).unwrap();
            worksheet.write_string(row, 1, *email).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[tokio::test]
    async fn test_import_three_rows_grows_snapshot() {
        let client = Arc::new(MockClient::new(vec![record("1", &[("name", "Zed")])]));
        let (invalidator, mut view, _worker) = spawn_cache(client.clone());
        invalidator.request_fetch().unwrap();
        let before = view.wait_for(|v| v.generation == 1).await.unwrap().records().len();

        let bytes = sheet(&[
            ["Ada", "ada@example.com"],
            ["Bo", "bo@example.com"],
            ["Cy", "cy@example.com"],
        ]);
        let report = ImportPipeline::new(client.as_ref(), &invalidator)
            .submit(&bytes)
            .await
            .unwrap();

        assert_eq!(report, ImportReport { parsed: 3, created: 3 });
        let creates: Vec<_> = client
            .calls()
            .into_iter()
            .filter(|c| matches!(c, Call::CreateMany(_)))
            .collect();
        assert_eq!(creates.len(), 1);
        if let Call::CreateMany(records) = &creates[0] {
            assert_eq!(records[0]["name"], json!("Ada"));
            assert_eq!(records[2]["email"], json!("cy@example.com"));
        }

        let after = view
            .wait_for(|v| v.generation == 2 && v.status == CacheStatus::Idle)
            .await
            .unwrap()
            .clone();
        assert!(after.records().len() >= before + 3);
        assert!(!after.stale);
    }

    #[tokio::test]
    async fn test_parse_error_makes_no_call() {
        let client = Arc::new(MockClient::new(vec![]));
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let err = ImportPipeline::new(client.as_ref(), &invalidator)
            .submit(b"definitely not a workbook")
            .await
            .unwrap_err();

        assert!(matches!(err, RosterError::Parse(_)));
        assert!(client.calls().is_empty());
        assert_eq!(invalidator.sent(), 0);
    }

    #[tokio::test]
    async fn test_remote_failure_skips_invalidate() {
        let client = Arc::new(MockClient::new(vec![]));
        client.fail_creates(true);
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let err = ImportPipeline::new(client.as_ref(), &invalidator)
            .submit(&sheet(&[["Ada", "ada@example.com"]]))
            .await
            .unwrap_err();

        assert!(matches!(err, RosterError::Remote(_)));
        assert_eq!(client.calls().len(), 1);
        assert_eq!(invalidator.sent(), 0);
        assert!(client.records().is_empty());
    }

    #[tokio::test]
    async fn test_header_only_sheet_imports_nothing() {
        let client = Arc::new(MockClient::new(vec![]));
        let (invalidator, _view, _worker) = spawn_cache(client.clone());

        let report = ImportPipeline::new(client.as_ref(), &invalidator)
            .submit(&sheet(&[]))
            .await
            .unwrap();

        assert_eq!(report, ImportReport { parsed: 0, created: 0 });
        assert!(client.calls().is_empty());
        assert_eq!(invalidator.sent(), 0);
    }
}
