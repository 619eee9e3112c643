//! Integration tests for the attachment fetcher against an in-memory mail server.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use assert_fs::prelude::*;
use predicates::prelude::*;

use imapattach::error::{FetchError, Result};
use imapattach::imap::{Connector, MailSession, ReadOnlyConnection};
use imapattach::model::part::{MessagePart, PartTree, TransferEncoding};
use imapattach::{AttachmentFetcher, SearchCriteria};

// ─── Fake server ────────────────────────────────────────────────────

#[derive(Default)]
struct FakeServer {
    structures: BTreeMap<u32, PartTree>,
    bodies: HashMap<(u32, Vec<u32>), Vec<u8>>,
    reject_search: Option<String>,
    opens: Cell<usize>,
    closes: Cell<usize>,
    searches: RefCell<Vec<(String, String)>>,
    body_fetches: RefCell<Vec<(u32, Vec<u32>)>>,
}

impl FakeServer {
    fn with_message(mut self, id: u32, tree: PartTree) -> Self {
        self.structures.insert(id, tree);
        self
    }

    fn with_body(mut self, id: u32, section: &[u32], body: &[u8]) -> Self {
        self.bodies.insert((id, section.to_vec()), body.to_vec());
        self
    }
}

#[derive(Clone)]
struct FakeConnector(Rc<FakeServer>);

struct FakeSession(Rc<FakeServer>);

impl Connector for FakeConnector {
    type Session = FakeSession;

    fn open(&self) -> Result<FakeSession> {
        self.0.opens.set(self.0.opens.get() + 1);
        Ok(FakeSession(Rc::clone(&self.0)))
    }

    fn describe(&self) -> String {
        "{fake:993/imap/ssl}INBOX".to_string()
    }
}

impl MailSession for FakeSession {
    fn search(&mut self, query: &str, charset: &str) -> Result<Vec<u32>> {
        self.0
            .searches
            .borrow_mut()
            .push((query.to_string(), charset.to_string()));
        if let Some(reason) = &self.0.reject_search {
            return Err(FetchError::protocol("SEARCH", reason.clone()));
        }
        Ok(self.0.structures.keys().copied().collect())
    }

    fn fetch_structure(&mut self, message: u32) -> Result<PartTree> {
        self.0
            .structures
            .get(&message)
            .cloned()
            .ok_or_else(|| FetchError::protocol("FETCH", "no such message"))
    }

    fn fetch_body(&mut self, message: u32, section: &[u32]) -> Result<Vec<u8>> {
        self.0
            .body_fetches
            .borrow_mut()
            .push((message, section.to_vec()));
        self.0
            .bodies
            .get(&(message, section.to_vec()))
            .cloned()
            .ok_or_else(|| FetchError::protocol("FETCH", "no such section"))
    }

    fn close(&mut self) -> Result<()> {
        self.0.closes.set(self.0.closes.get() + 1);
        Ok(())
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn text_part(section: &[u32]) -> MessagePart {
    MessagePart {
        section: section.to_vec(),
        content_type: "text/plain".into(),
        params: vec![("charset".into(), "utf-8".into())],
        ..MessagePart::default()
    }
}

fn file_part(section: &[u32], filename: &str, encoding: TransferEncoding) -> MessagePart {
    MessagePart {
        section: section.to_vec(),
        content_type: "application/octet-stream".into(),
        params: vec![("name".into(), filename.into())],
        disposition: Some("attachment".into()),
        disposition_params: vec![("filename".into(), filename.into())],
        encoding,
        size: 0,
    }
}

fn mixed(parts: Vec<PartTree>) -> PartTree {
    PartTree::Multipart {
        subtype: "mixed".into(),
        parts,
    }
}

fn new_fetcher(
    server: FakeServer,
    dir: &std::path::Path,
) -> (Rc<FakeServer>, AttachmentFetcher<FakeConnector>) {
    let server = Rc::new(server);
    let connection = ReadOnlyConnection::new(FakeConnector(Rc::clone(&server)));
    let fetcher = AttachmentFetcher::new(connection, Some(dir.to_path_buf()));
    (server, fetcher)
}

// ─── Tests ──────────────────────────────────────────────────────────

#[test]
fn test_no_matches_returns_empty_and_closes() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let (server, mut fetcher) = new_fetcher(FakeServer::default(), tmp.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();

    assert!(saved.is_empty());
    assert_eq!(server.opens.get(), 1);
    assert_eq!(server.closes.get(), 1);
    assert!(!fetcher.connection().is_open());
    assert_eq!(
        server.searches.borrow().as_slice(),
        &[("ALL".to_string(), "UTF-8".to_string())]
    );
}

#[test]
fn test_base64_attachment_is_decoded_and_saved() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer::default()
        .with_message(
            7,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(&[2], "report.pdf", TransferEncoding::Base64)),
            ]),
        )
        .with_body(7, &[2], b"JVBERi0xLjQK\r\nJSVFT0YK\r\n");
    let (server, mut fetcher) = new_fetcher(server, tmp.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();

    assert_eq!(saved.len(), 1);
    let att = &saved[0];
    assert_eq!(att.message, 7);
    assert_eq!(att.section, "2");
    assert_eq!(att.original_filename.as_deref(), Some("report.pdf"));
    assert_eq!(att.name.as_deref(), Some("report.pdf"));
    assert_eq!(att.size, 15);
    assert_eq!(att.filepath.parent(), Some(tmp.path()));

    let file = tmp.child(att.filepath.file_name().unwrap());
    file.assert(predicate::path::is_file());
    file.assert("%PDF-1.4\n%%EOF\n");

    // The text body is never downloaded.
    assert_eq!(server.body_fetches.borrow().as_slice(), &[(7, vec![2])]);
    assert_eq!(server.closes.get(), 1);
}

#[test]
fn test_quoted_printable_attachment() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer::default()
        .with_message(
            1,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(
                    &[2],
                    "notes.txt",
                    TransferEncoding::QuotedPrintable,
                )),
            ]),
        )
        .with_body(1, &[2], b"caf=C3=A9 au =\r\nlait");
    let (_server, mut fetcher) = new_fetcher(server, tmp.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();

    assert_eq!(saved.len(), 1);
    tmp.child(saved[0].filepath.file_name().unwrap())
        .assert("café au lait");
}

#[test]
fn test_unencoded_attachment_is_saved_verbatim() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer::default()
        .with_message(
            3,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(&[2], "data.csv", TransferEncoding::SevenBit)),
            ]),
        )
        .with_body(3, &[2], b"a;b\n1;2\n");
    let (_server, mut fetcher) = new_fetcher(server, tmp.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();
    tmp.child(saved[0].filepath.file_name().unwrap())
        .assert("a;b\n1;2\n");
}

#[test]
fn test_rejected_search_is_unknown_criteria() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer {
        reject_search: Some("Unknown search criterion: FOO".into()),
        ..FakeServer::default()
    };
    let (server, mut fetcher) = new_fetcher(server, tmp.path());
    let criteria = SearchCriteria::builder()
        .subject("Aplikace OMS - data file")
        .build()
        .unwrap();

    let err = fetcher.fetch_attachments(&criteria).unwrap_err();
    match err {
        FetchError::UnknownSearchCriteria { query, reason } => {
            assert_eq!(query, "SUBJECT \"Aplikace OMS - data file\"");
            assert!(reason.contains("FOO"));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    drop(fetcher);
    assert_eq!(server.closes.get(), 1);
    tmp.assert(predicate::path::is_dir());
}

#[test]
fn test_message_then_part_order() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer::default()
        .with_message(
            2,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(&[2], "b1.bin", TransferEncoding::Binary)),
                PartTree::Single(file_part(&[3], "b2.bin", TransferEncoding::Binary)),
            ]),
        )
        .with_body(2, &[2], b"b1")
        .with_body(2, &[3], b"b2")
        .with_message(
            1,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(&[2], "a1.bin", TransferEncoding::Binary)),
            ]),
        )
        .with_body(1, &[2], b"a1");
    let (_server, mut fetcher) = new_fetcher(server, tmp.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();
    let order: Vec<(u32, &str, &str)> = saved
        .iter()
        .map(|a| (a.message, a.section.as_str(), a.display_name()))
        .collect();
    assert_eq!(
        order,
        vec![(1, "2", "a1.bin"), (2, "2", "b1.bin"), (2, "3", "b2.bin")]
    );
}

#[test]
fn test_nested_parts_are_opt_in() {
    let tree = mixed(vec![
        PartTree::Single(text_part(&[1])),
        PartTree::Multipart {
            subtype: "mixed".into(),
            parts: vec![
                PartTree::Single(text_part(&[2, 1])),
                PartTree::Single(file_part(&[2, 2], "inner.zip", TransferEncoding::Binary)),
            ],
        },
        PartTree::Single(file_part(&[3], "outer.zip", TransferEncoding::Binary)),
    ]);
    let server = || {
        FakeServer::default()
            .with_message(5, tree.clone())
            .with_body(5, &[2, 2], b"inner")
            .with_body(5, &[3], b"outer")
    };

    let tmp = assert_fs::TempDir::new().unwrap();
    let (_s, mut top_only) = new_fetcher(server(), tmp.path());
    let saved = top_only
        .fetch_attachments(&SearchCriteria::default())
        .unwrap();
    let sections: Vec<&str> = saved.iter().map(|a| a.section.as_str()).collect();
    assert_eq!(sections, vec!["3"]);

    let (_s, nested) = new_fetcher(server(), tmp.path());
    let mut nested = nested.with_nested_parts(true);
    let saved = nested.fetch_attachments(&SearchCriteria::default()).unwrap();
    let sections: Vec<&str> = saved.iter().map(|a| a.section.as_str()).collect();
    assert_eq!(sections, vec!["2.2", "3"]);
}

#[test]
fn test_single_part_message_has_no_attachments() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server =
        FakeServer::default().with_message(1, PartTree::Single(text_part(&[1])));
    let (server, mut fetcher) = new_fetcher(server, tmp.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();
    assert!(saved.is_empty());
    assert!(server.body_fetches.borrow().is_empty());
}

#[test]
fn test_connection_is_lazy_and_closed_on_drop() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let (server, fetcher) = new_fetcher(FakeServer::default(), tmp.path());
    assert_eq!(server.opens.get(), 0);
    assert!(!fetcher.connection().is_open());
    drop(fetcher);
    assert_eq!(server.closes.get(), 0);

    let server = Rc::new(FakeServer::default());
    let mut connection = ReadOnlyConnection::new(FakeConnector(Rc::clone(&server)));
    connection.session().unwrap();
    connection.session().unwrap();
    assert_eq!(server.opens.get(), 1);
    drop(connection);
    assert_eq!(server.closes.get(), 1);
}

#[test]
fn test_charset_is_passed_to_search() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let (server, mut fetcher) = new_fetcher(FakeServer::default(), tmp.path());
    let criteria = SearchCriteria::builder()
        .charset("ISO-8859-2")
        .unseen()
        .build()
        .unwrap();

    fetcher.fetch_attachments(&criteria).unwrap();
    assert_eq!(
        server.searches.borrow().as_slice(),
        &[("UNSEEN".to_string(), "ISO-8859-2".to_string())]
    );
}

#[test]
fn test_progress_is_reported_per_message() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer::default()
        .with_message(1, PartTree::Single(text_part(&[1])))
        .with_message(2, PartTree::Single(text_part(&[1])));
    let (_server, mut fetcher) = new_fetcher(server, tmp.path());

    let calls = RefCell::new(Vec::new());
    fetcher
        .fetch_attachments_with_progress(&SearchCriteria::default(), &|done, total| {
            calls.borrow_mut().push((done, total));
        })
        .unwrap();
    assert_eq!(calls.into_inner(), vec![(0, 2), (1, 2), (2, 2)]);
}

#[test]
fn test_missing_save_dir_is_created() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let target = tmp.child("out").child("attachments");
    let server = FakeServer::default()
        .with_message(
            1,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(&[2], "x.bin", TransferEncoding::Binary)),
            ]),
        )
        .with_body(1, &[2], b"x");
    let (_server, mut fetcher) = new_fetcher(server, target.path());

    let saved = fetcher.fetch_attachments(&SearchCriteria::default()).unwrap();
    target.assert(predicate::path::is_dir());
    assert_eq!(saved[0].filepath.parent(), Some(target.path()));
}

#[test]
fn test_bad_base64_is_a_decode_error() {
    let tmp = assert_fs::TempDir::new().unwrap();
    let server = FakeServer::default()
        .with_message(
            1,
            mixed(vec![
                PartTree::Single(text_part(&[1])),
                PartTree::Single(file_part(&[2], "x.bin", TransferEncoding::Base64)),
            ]),
        )
        .with_body(1, &[2], b"!!!not base64!!!");
    let (_server, mut fetcher) = new_fetcher(server, tmp.path());

    let err = fetcher
        .fetch_attachments(&SearchCriteria::default())
        .unwrap_err();
    assert!(matches!(err, FetchError::Decode { .. }));
}
