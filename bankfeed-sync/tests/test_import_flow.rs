use bankfeed_core::{
    AccountMap, ImportConfig, ImportError, ParseError, RowError, RowPolicies, SourceError,
    SubmissionError,
};
use bankfeed_ingest::{
    Deleter, DirectorySource, Disposal, FileHandle, FileSource, FsDeleter, InlineSource,
    SourceFile,
};
use bankfeed_sync::{encode_batch, FileOutcome, HttpClient, HttpRequest, HttpResponse, Importer};
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;

const COFFEE_CSV: &str = "date,payee,amount,account\n2024-01-05,Coffee Shop,-4.50,Checking\n";

/// Answers from a queue (201 once it runs dry) and records every request
#[derive(Default)]
struct FakeClient {
    responses: RefCell<VecDeque<HttpResponse>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl FakeClient {
    fn with_statuses(statuses: &[u16]) -> Self {
        let client = Self::default();
        for &status in statuses {
            client.responses.borrow_mut().push_back(HttpResponse {
                status,
                body: format!(r#"{{"status":{status}}}"#),
            });
        }
        client
    }

    fn bodies(&self) -> Vec<serde_json::Value> {
        self.requests
            .borrow()
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }
}

impl HttpClient for FakeClient {
    fn post(&self, request: &HttpRequest) -> Result<HttpResponse, SubmissionError> {
        self.requests.borrow_mut().push(request.clone());
        Ok(self
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(HttpResponse {
                status: 201,
                body: String::new(),
            }))
    }
}

#[derive(Default)]
struct RecordingDeleter {
    deleted: RefCell<Vec<FileHandle>>,
}

impl Deleter for RecordingDeleter {
    fn delete(&self, handle: &FileHandle) -> Result<(), SourceError> {
        self.deleted.borrow_mut().push(handle.clone());
        Ok(())
    }
}

struct FixedSource(Vec<SourceFile>);

impl FileSource for FixedSource {
    fn list_files(&self) -> Result<Vec<SourceFile>, SourceError> {
        Ok(self.0.clone())
    }
}

fn file(name: &str, content: &str) -> SourceFile {
    SourceFile {
        handle: FileHandle::new(format!("drive://{name}")),
        name: name.to_string(),
        content: content.to_string(),
    }
}

fn config() -> ImportConfig {
    ImportConfig::new("bud-1", "token-1", AccountMap::new().with("Checking", "acct-123"))
}

#[test]
fn test_coffee_shop_scenario() {
    let cfg = config();
    let client = FakeClient::default();
    let deleter = RecordingDeleter::default();
    let source = InlineSource::new(FileHandle::new("jan.csv"), "jan.csv", COFFEE_CSV);

    let report = Importer::new(&cfg, &client).run(&source, &deleter).unwrap();
    assert!(report.is_success());
    assert_eq!(report.imported(), 1);

    let requests = client.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.ends_with("/v1/budgets/bud-1/transactions"));
    assert_eq!(requests[0].headers["authorization"], "Bearer token-1");
    drop(requests);

    assert_eq!(
        client.bodies()[0],
        json!({"transactions": [{
            "date": "2024-01-05",
            "amount": -4.50,
            "payee_name": "Coffee Shop",
            "account_id": "acct-123"
        }]})
    );
    assert_eq!(*deleter.deleted.borrow(), vec![FileHandle::new("jan.csv")]);
}

#[test]
fn test_unauthorized_keeps_the_file() {
    let cfg = config();
    let client = FakeClient::with_statuses(&[401]);
    let deleter = RecordingDeleter::default();

    let result = Importer::new(&cfg, &client).import_file(&file("jan.csv", COFFEE_CSV), &deleter);

    match result {
        Err(ImportError::Submission(SubmissionError::Rejected { status, .. })) => {
            assert_eq!(status, 401)
        }
        other => panic!("expected a 401 rejection, got {other:?}"),
    }
    assert!(deleter.deleted.borrow().is_empty());
}

#[test]
fn test_files_are_isolated_from_each_other() {
    let cfg = config();
    // first file is rejected, second accepted
    let client = FakeClient::with_statuses(&[500, 201]);
    let deleter = RecordingDeleter::default();
    let source = FixedSource(vec![
        file("a.csv", COFFEE_CSV),
        file(
            "b.csv",
            "date,payee,amount,account\n\
             2024-02-01,Bakery,-3.25,Checking\n\
             2024-02-02,Payroll,1500.00,Checking\n",
        ),
    ]);

    let report = Importer::new(&cfg, &client).run(&source, &deleter).unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.imported(), 1);
    assert!(!report.is_success());
    assert_eq!(report.files[0].name, "a.csv");
    assert!(matches!(
        &report.files[0].result,
        Err(ImportError::Submission(e)) if e.status() == Some(500)
    ));

    let bodies = client.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(bodies[1]["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(bodies[1]["transactions"][0]["payee_name"], "Bakery");

    assert_eq!(
        *deleter.deleted.borrow(),
        vec![FileHandle::new("drive://b.csv")]
    );
}

#[test]
fn test_parse_error_skips_file_without_posting() {
    let cfg = config();
    let client = FakeClient::default();
    let deleter = RecordingDeleter::default();
    let source = FixedSource(vec![
        file("broken.csv", "date,payee,account\n2024-01-05,Coffee Shop,Checking\n"),
        file("good.csv", COFFEE_CSV),
    ]);

    let report = Importer::new(&cfg, &client).run(&source, &deleter).unwrap();

    assert!(matches!(
        &report.files[0].result,
        Err(ImportError::Parse(ParseError::MissingColumns { .. }))
    ));
    assert!(report.files[1].result.is_ok());
    assert_eq!(client.requests.borrow().len(), 1);
    assert_eq!(deleter.deleted.borrow().len(), 1);
}

#[test]
fn test_unmapped_rows_skipped_or_fatal_by_policy() {
    let csv = "date,payee,amount,account\n\
               2024-01-05,Coffee Shop,-4.50,Checking\n\
               2024-01-06,Broker,-100.00,Brokerage\n";

    let cfg = config();
    let client = FakeClient::default();
    let deleter = RecordingDeleter::default();
    let outcome = Importer::new(&cfg, &client)
        .import_file(&file("mixed.csv", csv), &deleter)
        .unwrap();
    match outcome {
        FileOutcome::Imported {
            confirmation,
            skipped,
            disposed,
        } => {
            assert_eq!(confirmation.submitted, 1);
            assert_eq!(skipped.len(), 1);
            assert!(matches!(skipped[0], RowError::UnmappedAccount(_)));
            assert!(disposed);
        }
        other => panic!("expected Imported, got {other:?}"),
    }
    let bodies = client.bodies();
    assert_eq!(bodies[0]["transactions"].as_array().unwrap().len(), 1);

    let strict = config().with_policies(RowPolicies::strict());
    let strict_client = FakeClient::default();
    let err = Importer::new(&strict, &strict_client)
        .import_file(&file("mixed.csv", csv), &deleter)
        .unwrap_err();
    assert!(matches!(err, ImportError::Row(RowError::UnmappedAccount(_))));
    assert!(strict_client.requests.borrow().is_empty());
}

#[test]
fn test_empty_batch_is_not_submitted() {
    let cfg = config();
    let client = FakeClient::default();
    let deleter = RecordingDeleter::default();

    let outcome = Importer::new(&cfg, &client)
        .import_file(&file("header-only.csv", "date,payee,amount,account\n"), &deleter)
        .unwrap();

    assert_eq!(outcome, FileOutcome::NothingToSubmit { skipped: vec![] });
    assert!(client.requests.borrow().is_empty());
    assert!(deleter.deleted.borrow().is_empty());
}

#[test]
fn test_prepare_is_deterministic() {
    let cfg = config();
    let client = FakeClient::default();
    let importer = Importer::new(&cfg, &client);
    let src = file(
        "jan.csv",
        "date,payee,amount,account,memo\n\
         2024-01-05,Coffee Shop,-4.50,Checking,latte\n\
         2024-01-06,Grocer,\"-1,020.10\",Checking,\n",
    );

    let first = importer.prepare(&src).unwrap();
    let second = importer.prepare(&src).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.batch.budget_id, "bud-1");
    assert_eq!(first.batch.source, "jan.csv");

    let a = encode_batch(&first.batch, cfg.amount_format).unwrap();
    let b = encode_batch(&second.batch, cfg.amount_format).unwrap();
    assert_eq!(a, b);
    assert!(client.requests.borrow().is_empty());
}

#[test]
fn test_directory_run_deletes_only_imported_files() {
    let dir = tempfile::TempDir::new().unwrap();
    fs::write(dir.path().join("01-ok.csv"), COFFEE_CSV).unwrap();
    fs::write(dir.path().join("02-rejected.csv"), COFFEE_CSV).unwrap();
    fs::write(dir.path().join("readme.txt"), "ignored").unwrap();

    let cfg = config();
    let client = FakeClient::with_statuses(&[201, 400]);
    let source = DirectorySource::new(dir.path());
    let deleter = FsDeleter::new(Disposal::Trash);

    let report = Importer::new(&cfg, &client).run(&source, &deleter).unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(report.imported(), 1);
    assert!(!dir.path().join("01-ok.csv").exists());
    assert!(dir.path().join(".trash").join("01-ok.csv").exists());
    assert!(dir.path().join("02-rejected.csv").exists());
    assert!(dir.path().join("readme.txt").exists());
}

#[test]
fn test_failed_disposal_is_reported_not_fatal() {
    struct BrokenDeleter;

    impl Deleter for BrokenDeleter {
        fn delete(&self, handle: &FileHandle) -> Result<(), SourceError> {
            Err(SourceError::Dispose {
                path: handle.as_str().into(),
                source: std::io::Error::other("read-only share"),
            })
        }
    }

    let cfg = config();
    let client = FakeClient::default();
    let outcome = Importer::new(&cfg, &client)
        .import_file(&file("jan.csv", COFFEE_CSV), &BrokenDeleter)
        .unwrap();

    assert!(matches!(outcome, FileOutcome::Imported { disposed: false, .. }));
}
