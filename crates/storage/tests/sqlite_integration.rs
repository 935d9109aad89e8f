use study_core::model::{ChapterProgress, ProblemId, ProgressKey, ProgressRecord};
use storage::repository::{ProgressRepository, RecordFilter, Storage, StorageError};
use storage::sqlite::SqliteRepository;

fn ids(raw: &[i64]) -> Vec<ProblemId> {
    raw.iter().copied().map(ProblemId::from).collect()
}

fn record(subject: &str, chapter: &str, completed: &[i64], favourites: &[i64]) -> ProgressRecord {
    ProgressRecord::new(
        ProgressKey::new(subject, chapter).unwrap(),
        ChapterProgress::new(ids(completed), ids(favourites)),
    )
}

#[tokio::test]
async fn sqlite_roundtrip_replaces_whole_record() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.put_record(&record("GK", "Indian Dance", &[1, 2], &[2]))
        .await
        .unwrap();
    let key = ProgressKey::new("GK", "Indian Dance").unwrap();
    let fetched = repo.get_record(&key).await.unwrap().expect("record");
    assert_eq!(fetched.id(), "GK-Indian Dance");
    assert_eq!(
        fetched.progress(),
        &ChapterProgress::new(ids(&[1, 2]), ids(&[2]))
    );

    repo.put_record(&record("GK", "Indian Dance", &[7], &[]))
        .await
        .unwrap();
    let fetched = repo.get_record(&key).await.unwrap().expect("record");
    assert_eq!(fetched.progress(), &ChapterProgress::new(ids(&[7]), []));
}

#[tokio::test]
async fn sqlite_keeps_text_and_numeric_ids_apart() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress_mixed_ids?mode=memory&cache=shared")
        .await
        .expect("connect");

    let key = ProgressKey::new("GK", "Music").unwrap();
    let progress = ChapterProgress::new(
        [ProblemId::from(1), ProblemId::from("1"), ProblemId::from("img-3")],
        [],
    );
    repo.put_record(&ProgressRecord::new(key.clone(), progress.clone()))
        .await
        .unwrap();

    let fetched = repo.get_record(&key).await.unwrap().expect("record");
    assert_eq!(fetched.progress().completed_problems.len(), 3);
    assert_eq!(fetched.into_progress(), progress);
}

#[tokio::test]
async fn sqlite_creates_schema_on_first_use() {
    // No explicit migrate: the first query sets the schema up.
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress_lazy?mode=memory&cache=shared")
        .await
        .expect("connect");

    let key = ProgressKey::new("GK", "Awards").unwrap();
    assert!(repo.get_record(&key).await.unwrap().is_none());

    repo.put_record(&record("GK", "Awards", &[4], &[])).await.unwrap();
    assert!(repo.get_record(&key).await.unwrap().is_some());

    repo.migrate().await.expect("second migrate is a no-op");
    repo.migrate().await.expect("third migrate is a no-op");
    assert!(repo.get_record(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn sqlite_scan_by_subject_and_chapter() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress_scan?mode=memory&cache=shared")
        .await
        .expect("connect");

    repo.put_record(&record("GK", "Dance", &[1], &[])).await.unwrap();
    repo.put_record(&record("GK", "Music", &[], &[3])).await.unwrap();
    repo.put_record(&record("Maths", "Dance", &[2], &[])).await.unwrap();

    let mut gk = repo
        .scan_records(&RecordFilter::Subject("GK".into()))
        .await
        .unwrap();
    gk.sort_by_key(ProgressRecord::id);
    let chapters: Vec<&str> = gk.iter().map(ProgressRecord::chapter).collect();
    assert_eq!(chapters, ["Dance", "Music"]);

    let dance = repo
        .scan_records(&RecordFilter::Chapter("Dance".into()))
        .await
        .unwrap();
    assert_eq!(dance.len(), 2);

    let all = repo.scan_records(&RecordFilter::All).await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn sqlite_reports_and_skips_malformed_rows() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_progress_malformed?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    sqlx::query(
        r"
        INSERT INTO progress (id, subject, chapter, completed_problems, favourites)
        VALUES ('GK-Broken', 'GK', 'Broken', 'not json', '[]')
        ",
    )
    .execute(repo.pool())
    .await
    .unwrap();
    repo.put_record(&record("GK", "Dance", &[1], &[])).await.unwrap();

    let key = ProgressKey::new("GK", "Broken").unwrap();
    let err = repo.get_record(&key).await.unwrap_err();
    assert!(matches!(err, StorageError::MalformedRecord { ref id, .. } if id == "GK-Broken"));

    let gk = repo
        .scan_records(&RecordFilter::Subject("GK".into()))
        .await
        .unwrap();
    assert_eq!(gk.len(), 1);
    assert_eq!(gk[0].chapter(), "Dance");
}

#[tokio::test]
async fn sqlite_progress_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("study.sqlite3").display());

    {
        let storage = Storage::sqlite(&url).await.expect("open");
        storage
            .progress
            .put_record(&record("GK", "Dance", &[1, 5], &[5]))
            .await
            .unwrap();
    }

    let storage = Storage::sqlite(&url).await.expect("reopen");
    let key = ProgressKey::new("GK", "Dance").unwrap();
    let fetched = storage.progress.get_record(&key).await.unwrap().expect("record");
    assert_eq!(fetched.progress(), &ChapterProgress::new(ids(&[1, 5]), ids(&[5])));
}

#[tokio::test]
async fn sqlite_open_failure_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    // A directory cannot be opened as a database file.
    let url = format!("sqlite://{}", dir.path().display());

    let err = Storage::sqlite(&url).await.err().expect("open should fail");
    assert!(StorageError::from(err).is_unavailable());
}
