use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::MigrateConfig;
use crate::elapsed::ElapsedTimer;
use crate::graphql::{GraphqlClient, PageApi, PageRequest, PageResult, page_path};
use crate::sanitize::{sanitize, sanitized_file_name, split_extension};

/// Files found directly inside one directory below the migration root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryBatch {
    pub name: String,
    pub dir: PathBuf,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NonUtf8Name,
    /// Another file already owns the remote path for this title, or the rename target exists.
    Collision { title: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    Submitted {
        request_path: String,
        result: PageResult,
    },
    RenameFailed {
        reason: String,
    },
    ReadFailed {
        reason: String,
    },
    Skipped {
        reason: SkipReason,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub category: String,
    pub source: PathBuf,
    pub renamed_to: Option<PathBuf>,
    pub outcome: FileOutcome,
}

#[derive(Debug, Clone, Default)]
pub struct MigrationReport {
    pub categories: usize,
    pub files: usize,
    pub renamed: usize,
    pub created: usize,
    pub rejected: usize,
    pub graphql_errors: usize,
    pub transport_errors: usize,
    pub malformed: usize,
    pub rename_errors: usize,
    pub read_errors: usize,
    pub skipped: usize,
    pub elapsed: Duration,
    pub records: Vec<FileRecord>,
}

impl MigrationReport {
    fn tally(&mut self, record: &FileRecord) {
        self.files += 1;
        if record.renamed_to.is_some() {
            self.renamed += 1;
        }
        match &record.outcome {
            FileOutcome::Submitted { result, .. } => match result {
                PageResult::Created { .. } => self.created += 1,
                PageResult::RemoteRejected { .. } => self.rejected += 1,
                PageResult::GraphqlError { .. } => self.graphql_errors += 1,
                PageResult::TransportError { .. } => self.transport_errors += 1,
                PageResult::MalformedResponse { .. } => self.malformed += 1,
            },
            FileOutcome::RenameFailed { .. } => self.rename_errors += 1,
            FileOutcome::ReadFailed { .. } => self.read_errors += 1,
            FileOutcome::Skipped { .. } => self.skipped += 1,
        }
    }

    /// Files that did not end up as a created page.
    pub fn failures(&self) -> usize {
        self.files - self.created
    }

    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }
}

/// Build the GraphQL client from `config` and migrate the whole tree.
pub fn migrate(config: &MigrateConfig) -> Result<MigrationReport> {
    let client = GraphqlClient::new(config)?;
    run_migration(config, &client)
}

/// Walk `config.root_dir`, rename files to their sanitized names and create one page per file.
///
/// Only a root that cannot be enumerated is an error; every per-file failure is
/// recorded in the report and the run carries on.
pub fn run_migration<A: PageApi>(config: &MigrateConfig, api: &A) -> Result<MigrationReport> {
    let timer = ElapsedTimer::start("Migration");

    let batches = plan_batches(&config.root_dir)?;
    info!(
        "Migrating {} files in {} categories from {}",
        batches.iter().map(|batch| batch.files.len()).sum::<usize>(),
        batches.len(),
        config.root_dir.display()
    );

    let records = execute_batches(&batches, api, config.concurrency)?;

    let mut report = MigrationReport {
        categories: batches.len(),
        ..MigrationReport::default()
    };
    for record in &records {
        report.tally(record);
    }
    report.records = records;
    report.elapsed = timer.elapsed();

    info!(
        "Pages created: {}/{} (renamed {}, rejected {}, graphql errors {}, transport errors {}, malformed {}, rename errors {}, read errors {}, skipped {})",
        report.created,
        report.files,
        report.renamed,
        report.rejected,
        report.graphql_errors,
        report.transport_errors,
        report.malformed,
        report.rename_errors,
        report.read_errors,
        report.skipped
    );
    Ok(report)
}

/// Collect regular files below `root`, grouped by their parent directory in walk order.
///
/// Files directly inside `root` are ignored. Entries are sorted by file name.
pub fn plan_batches(root: &Path) -> Result<Vec<CategoryBatch>> {
    let metadata = fs::metadata(root)
        .with_context(|| format!("failed to read migration root {}", root.display()))?;
    if !metadata.is_dir() {
        bail!("migration root {} is not a directory", root.display());
    }

    let mut batches: Vec<CategoryBatch> = Vec::new();
    let mut batch_index: HashMap<PathBuf, usize> = HashMap::new();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(error) if error.depth() == 0 => {
                return Err(error)
                    .with_context(|| format!("failed to walk {}", root.display()));
            }
            Err(error) => {
                warn!("Skipping unreadable entry under {}: {error}", root.display());
                continue;
            }
        };
        if entry.depth() < 2 {
            continue;
        }
        let is_file = entry.file_type().is_file()
            || (entry.path_is_symlink() && entry.path().is_file());
        if !is_file {
            continue;
        }

        let path = entry.into_path();
        let Some(dir) = path.parent().map(Path::to_path_buf) else {
            continue;
        };
        let index = match batch_index.get(&dir) {
            Some(index) => *index,
            None => {
                let name = dir
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                batches.push(CategoryBatch {
                    name,
                    dir: dir.clone(),
                    files: Vec::new(),
                });
                batch_index.insert(dir, batches.len() - 1);
                batches.len() - 1
            }
        };
        batches[index].files.push(path);
    }

    Ok(batches)
}

fn execute_batches<A: PageApi>(
    batches: &[CategoryBatch],
    api: &A,
    concurrency: usize,
) -> Result<Vec<FileRecord>> {
    let planned = plan_titles(batches);

    if concurrency <= 1 || batches.len() <= 1 {
        let mut records = Vec::new();
        for (batch, files) in batches.iter().zip(&planned) {
            records.extend(process_batch(&batch.name, files, api, log_record));
        }
        return Ok(records);
    }

    // Directories with the same name upload under the same path prefix; one worker takes them all.
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut group_by_name: HashMap<&str, usize> = HashMap::new();
    for (index, batch) in batches.iter().enumerate() {
        match group_by_name.get(batch.name.as_str()) {
            Some(group) => groups[*group].push(index),
            None => {
                group_by_name.insert(batch.name.as_str(), groups.len());
                groups.push(vec![index]);
            }
        }
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(concurrency)
        .build()
        .context("failed to build upload worker pool")?;
    let finished: Vec<Vec<(usize, Vec<FileRecord>)>> = pool.install(|| {
        groups
            .par_iter()
            .map(|group| {
                group
                    .iter()
                    .map(|&index| {
                        let records =
                            process_batch(&batches[index].name, &planned[index], api, |_| {});
                        (index, records)
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    });

    let mut by_batch: Vec<(usize, Vec<FileRecord>)> = finished.into_iter().flatten().collect();
    by_batch.sort_by_key(|(index, _)| *index);
    let records: Vec<FileRecord> = by_batch
        .into_iter()
        .flat_map(|(_, records)| records)
        .collect();
    for record in &records {
        log_record(record);
    }
    Ok(records)
}

/// Names derived for one file before anything touches the disk.
struct NamePlan {
    file_name: String,
    title: String,
    target_name: String,
}

impl NamePlan {
    fn for_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let (base, _) = split_extension(&file_name);
        Some(Self {
            title: sanitize(base),
            target_name: sanitized_file_name(&file_name),
            file_name,
        })
    }

    fn needs_rename(&self) -> bool {
        self.target_name != self.file_name
    }
}

struct PlannedFile<'a> {
    path: &'a Path,
    names: Option<NamePlan>,
    owns_path: bool,
}

/// Decide which file gets to create each remote path, across the whole run.
///
/// A path is owned by the first file already carrying its sanitized name, else by
/// the first file in walk order. Every other file mapping to it is skipped untouched.
fn plan_titles(batches: &[CategoryBatch]) -> Vec<Vec<PlannedFile<'_>>> {
    let mut planned: Vec<Vec<PlannedFile<'_>>> = batches
        .iter()
        .map(|batch| {
            batch
                .files
                .iter()
                .map(|path| PlannedFile {
                    path: path.as_path(),
                    names: NamePlan::for_path(path),
                    owns_path: false,
                })
                .collect()
        })
        .collect();

    let mut owners: HashMap<String, (usize, usize)> = HashMap::new();
    for clean_only in [true, false] {
        for (batch_index, files) in planned.iter().enumerate() {
            for (file_index, file) in files.iter().enumerate() {
                if let Some(names) = &file.names
                    && !(clean_only && names.needs_rename())
                {
                    owners
                        .entry(page_path(&batches[batch_index].name, &names.title))
                        .or_insert((batch_index, file_index));
                }
            }
        }
    }
    for (batch_index, file_index) in owners.into_values() {
        planned[batch_index][file_index].owns_path = true;
    }
    planned
}

/// Process one directory strictly in order, calling `emit` after each file.
fn process_batch<A, F>(
    category: &str,
    files: &[PlannedFile<'_>],
    api: &A,
    mut emit: F,
) -> Vec<FileRecord>
where
    A: PageApi,
    F: FnMut(&FileRecord),
{
    let mut records = Vec::with_capacity(files.len());
    for file in files {
        let record = match &file.names {
            None => FileRecord {
                category: category.to_string(),
                source: file.path.to_path_buf(),
                renamed_to: None,
                outcome: FileOutcome::Skipped {
                    reason: SkipReason::NonUtf8Name,
                },
            },
            Some(names) if !file.owns_path => FileRecord {
                category: category.to_string(),
                source: file.path.to_path_buf(),
                renamed_to: None,
                outcome: FileOutcome::Skipped {
                    reason: SkipReason::Collision {
                        title: names.title.clone(),
                    },
                },
            },
            Some(names) => process_file(category, file.path, names, api),
        };
        emit(&record);
        records.push(record);
    }
    records
}

fn process_file<A: PageApi>(
    category: &str,
    path: &Path,
    plan: &NamePlan,
    api: &A,
) -> FileRecord {
    let (renamed_to, outcome) = rename_and_submit(category, path, plan, api);
    FileRecord {
        category: category.to_string(),
        source: path.to_path_buf(),
        renamed_to,
        outcome,
    }
}

fn rename_and_submit<A: PageApi>(
    category: &str,
    path: &Path,
    plan: &NamePlan,
    api: &A,
) -> (Option<PathBuf>, FileOutcome) {
    let mut renamed_to = None;
    if plan.needs_rename() {
        let target = path.with_file_name(&plan.target_name);
        if fs::symlink_metadata(&target).is_ok() {
            let reason = SkipReason::Collision {
                title: plan.title.clone(),
            };
            return (None, FileOutcome::Skipped { reason });
        }
        if let Err(error) = fs::rename(path, &target) {
            let reason = error.to_string();
            return (None, FileOutcome::RenameFailed { reason });
        }
        renamed_to = Some(target);
    }

    let current = renamed_to.as_deref().unwrap_or(path);
    let content = match fs::read_to_string(current) {
        Ok(content) => content,
        Err(error) => {
            let reason = error.to_string();
            return (renamed_to, FileOutcome::ReadFailed { reason });
        }
    };

    let request = PageRequest {
        title: plan.title.clone(),
        content,
        description: category.to_string(),
    };
    let result = api.create_page(&request);
    let outcome = FileOutcome::Submitted {
        request_path: request.path(),
        result,
    };
    (renamed_to, outcome)
}

fn log_record(record: &FileRecord) {
    let source = display_name(&record.source);
    if let Some(renamed_to) = &record.renamed_to {
        info!(
            "Renamed file: '{}' → '{}'",
            source,
            display_name(renamed_to)
        );
    }
    match &record.outcome {
        FileOutcome::Submitted { result, .. } if result.is_created() => {
            info!("[{}] {}", record.category, result);
        }
        FileOutcome::Submitted {
            request_path,
            result,
        } => {
            warn!(
                "[{}] {} ({}): {}",
                record.category, source, request_path, result
            );
        }
        FileOutcome::RenameFailed { reason } => {
            warn!("[{}] failed to rename {}: {}", record.category, source, reason);
        }
        FileOutcome::ReadFailed { reason } => {
            warn!("[{}] failed to read {}: {}", record.category, source, reason);
        }
        FileOutcome::Skipped {
            reason: SkipReason::NonUtf8Name,
        } => {
            warn!(
                "[{}] skipped {}: file name is not valid UTF-8",
                record.category,
                record.source.display()
            );
        }
        FileOutcome::Skipped {
            reason: SkipReason::Collision { title },
        } => {
            warn!(
                "[{}] skipped {}: path for title '{}' is already taken",
                record.category, source, title
            );
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use tempfile::tempdir;

    use super::*;
    use crate::config::ApiToken;

    #[derive(Default)]
    struct MockApi {
        scripted: BTreeMap<String, PageResult>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl MockApi {
        fn failing(title: &str, result: PageResult) -> Self {
            let mut api = Self::default();
            api.scripted.insert(title.to_string(), result);
            api
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().expect("requests lock").clone()
        }
    }

    impl PageApi for MockApi {
        fn create_page(&self, request: &PageRequest) -> PageResult {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            self.scripted
                .get(&request.title)
                .cloned()
                .unwrap_or_else(|| PageResult::Created {
                    path: request.path(),
                    title: request.title.clone(),
                })
        }
    }

    fn config(root: &Path) -> MigrateConfig {
        MigrateConfig {
            api_url: "https://wiki.example.org/graphql".to_string(),
            token: ApiToken::new("token"),
            root_dir: root.to_path_buf(),
            locale: "ru".to_string(),
            timeout_ms: 1_000,
            concurrency: 1,
            user_agent: "wikimigrate/test".to_string(),
        }
    }

    fn write_file(path: &Path, content: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write file");
    }

    fn transport_error() -> PageResult {
        PageResult::TransportError {
            status: Some(503),
            body: "unavailable".to_string(),
        }
    }

    #[test]
    fn renames_and_submits_single_file() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("draft 1.txt"), b"hello");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        assert!(!root.join("Notes").join("draft 1.txt").exists());
        assert!(root.join("Notes").join("draft-1.txt").exists());
        assert_eq!(
            api.requests(),
            vec![PageRequest {
                title: "draft-1".to_string(),
                content: "hello".to_string(),
                description: "Notes".to_string(),
            }]
        );
        assert_eq!(report.categories, 1);
        assert_eq!(report.files, 1);
        assert_eq!(report.renamed, 1);
        assert_eq!(report.created, 1);
        assert!(!report.has_failures());
        assert_eq!(
            report.records[0].outcome,
            FileOutcome::Submitted {
                request_path: "/Notes/draft-1".to_string(),
                result: PageResult::Created {
                    path: "/Notes/draft-1".to_string(),
                    title: "draft-1".to_string(),
                },
            }
        );
    }

    #[test]
    fn second_pass_performs_no_renames() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("draft 1.txt"), b"hello");
        write_file(&root.join("Заметки").join("План работ v2.1.md"), b"plan");
        write_file(&root.join("Notes").join("clean.txt"), b"clean");

        let first = run_migration(&config(&root), &MockApi::default()).expect("first run");
        assert_eq!(first.renamed, 2);

        let second = run_migration(&config(&root), &MockApi::default()).expect("second run");
        assert_eq!(second.renamed, 0);
        assert_eq!(second.created, 3);
        assert!(root.join("Заметки").join("План-работ-v2-1.md").exists());
    }

    #[test]
    fn failure_on_one_file_does_not_stop_the_category() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("a.txt"), b"first");
        write_file(&root.join("Notes").join("b.txt"), b"second");

        let api = MockApi::failing("a", transport_error());
        let report = run_migration(&config(&root), &api).expect("run");

        assert_eq!(api.requests().len(), 2);
        assert_eq!(report.transport_errors, 1);
        assert_eq!(report.created, 1);
        assert!(report.has_failures());
        assert_eq!(report.failures(), 1);
        assert_eq!(
            report.records[1].outcome,
            FileOutcome::Submitted {
                request_path: "/Notes/b".to_string(),
                result: PageResult::Created {
                    path: "/Notes/b".to_string(),
                    title: "b".to_string(),
                },
            }
        );
    }

    #[test]
    fn every_remote_outcome_is_tallied() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        for name in ["created", "graphql", "malformed", "rejected", "transport"] {
            write_file(&root.join("Notes").join(format!("{name}.md")), b"x");
        }

        let mut api = MockApi::failing("transport", transport_error());
        api.scripted.insert(
            "rejected".to_string(),
            PageResult::RemoteRejected {
                message: "already exists".to_string(),
                error_code: Some(serde_json::json!(6002)),
            },
        );
        api.scripted.insert(
            "graphql".to_string(),
            PageResult::GraphqlError {
                errors: serde_json::json!([{"message": "bad"}]),
            },
        );
        api.scripted.insert(
            "malformed".to_string(),
            PageResult::MalformedResponse {
                detail: "missing data.pages.create".to_string(),
            },
        );

        let report = run_migration(&config(&root), &api).expect("run");
        assert_eq!(report.files, 5);
        assert_eq!(report.created, 1);
        assert_eq!(report.rejected, 1);
        assert_eq!(report.graphql_errors, 1);
        assert_eq!(report.transport_errors, 1);
        assert_eq!(report.malformed, 1);
        assert_eq!(report.failures(), 4);
    }

    #[test]
    fn files_directly_in_root_are_ignored() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("stray file.txt"), b"ignored");
        write_file(&root.join("Notes").join("kept.txt"), b"kept");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        assert!(root.join("stray file.txt").exists());
        assert_eq!(report.files, 1);
        assert_eq!(api.requests()[0].title, "kept");
    }

    #[test]
    fn nested_files_use_their_own_directory_as_category() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("a.txt"), b"a");
        write_file(&root.join("Notes").join("sub dir").join("b.txt"), b"b");
        write_file(&root.join("Notes").join("z.txt"), b"z");

        let batches = plan_batches(&root).expect("plan");
        let summary: Vec<(&str, usize)> = batches
            .iter()
            .map(|batch| (batch.name.as_str(), batch.files.len()))
            .collect();
        assert_eq!(summary, vec![("Notes", 2), ("sub dir", 1)]);

        let api = MockApi::default();
        run_migration(&config(&root), &api).expect("run");
        let paths: Vec<String> = api.requests().iter().map(PageRequest::path).collect();
        assert_eq!(paths, vec!["/Notes/a", "/Notes/z", "/sub dir/b"]);
    }

    #[test]
    fn unreadable_content_is_recorded_and_skipped() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("binary.bin"), &[0xff, 0xfe, 0x00, 0x81]);
        write_file(&root.join("Notes").join("text.txt"), b"fine");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        assert_eq!(report.read_errors, 1);
        assert_eq!(report.created, 1);
        assert_eq!(api.requests().len(), 1);
        assert!(matches!(
            report.records[0].outcome,
            FileOutcome::ReadFailed { .. }
        ));
    }

    #[test]
    fn missing_root_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("does-not-exist");
        let error = run_migration(&config(&root), &MockApi::default()).expect_err("must fail");
        assert!(error.to_string().contains("failed to read migration root"));
    }

    #[test]
    fn root_that_is_a_file_is_fatal() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root, b"not a dir");
        let error = plan_batches(&root).expect_err("must fail");
        assert!(error.to_string().contains("is not a directory"));
    }

    #[test]
    fn colliding_titles_submit_once_and_prefer_clean_name() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("a b.txt"), b"spaced");
        write_file(&root.join("Notes").join("a-b.txt"), b"clean");
        write_file(&root.join("Notes").join("a.b.md"), b"dotted");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        assert_eq!(api.requests().len(), 1);
        assert_eq!(api.requests()[0].content, "clean");
        assert_eq!(report.skipped, 2);
        assert_eq!(report.renamed, 0);
        assert!(root.join("Notes").join("a b.txt").exists());
        assert!(root.join("Notes").join("a.b.md").exists());
        assert_eq!(
            report.records[0].outcome,
            FileOutcome::Skipped {
                reason: SkipReason::Collision {
                    title: "a-b".to_string(),
                },
            }
        );
    }

    #[test]
    fn same_named_directories_share_one_remote_path() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("A").join("Notes").join("x.txt"), b"from a");
        write_file(&root.join("B").join("Notes").join("x.txt"), b"from b");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        let paths: Vec<String> = api.requests().iter().map(PageRequest::path).collect();
        assert_eq!(paths, vec!["/Notes/x"]);
        assert_eq!(api.requests()[0].content, "from a");
        assert_eq!(report.created, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(
            report.records[1].outcome,
            FileOutcome::Skipped {
                reason: SkipReason::Collision {
                    title: "x".to_string(),
                },
            }
        );
    }

    #[test]
    fn same_named_directories_prefer_clean_name_under_worker_pool() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("A").join("Notes").join("x y.txt"), b"spaced");
        write_file(&root.join("B").join("Notes").join("x-y.txt"), b"clean");
        write_file(&root.join("C").join("Other").join("z.txt"), b"other");

        let mut parallel_config = config(&root);
        parallel_config.concurrency = 3;
        let api = MockApi::default();
        let report = run_migration(&parallel_config, &api).expect("run");

        let mut paths: Vec<String> = api.requests().iter().map(PageRequest::path).collect();
        paths.sort();
        assert_eq!(paths, vec!["/Notes/x-y", "/Other/z"]);
        assert!(
            api.requests()
                .iter()
                .any(|request| request.content == "clean")
        );
        assert_eq!(report.skipped, 1);
        assert_eq!(report.renamed, 0);
        assert!(root.join("A").join("Notes").join("x y.txt").exists());
        let categories: Vec<&str> = report
            .records
            .iter()
            .map(|record| record.category.as_str())
            .collect();
        assert_eq!(categories, vec!["Notes", "Notes", "Other"]);
    }

    #[test]
    fn rename_never_overwrites_existing_entry() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("my note.txt"), b"note");
        fs::create_dir_all(root.join("Notes").join("my-note.txt")).expect("create blocking dir");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        assert!(root.join("Notes").join("my note.txt").exists());
        assert!(api.requests().is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn fully_removable_name_keeps_file_and_submits_empty_title() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("%%%"), b"odd");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");

        assert!(root.join("Notes").join("%%%").exists());
        assert_eq!(report.renamed, 0);
        assert_eq!(api.requests()[0].title, "");
        assert_eq!(api.requests()[0].path(), "/Notes/");
    }

    #[test]
    fn empty_base_with_extension_is_stable_across_runs() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("Notes").join("%%.md"), b"odd");

        let first_api = MockApi::default();
        let first = run_migration(&config(&root), &first_api).expect("first run");
        let second_api = MockApi::default();
        let second = run_migration(&config(&root), &second_api).expect("second run");

        assert_eq!(first.renamed, 0);
        assert_eq!(second.renamed, 0);
        assert!(root.join("Notes").join("%%.md").exists());
        assert!(!root.join("Notes").join(".md").exists());
        assert_eq!(first_api.requests()[0].title, "");
        assert_eq!(second_api.requests()[0].title, "");
        assert_eq!(second_api.requests()[0].path(), "/Notes/");
    }

    #[test]
    fn category_name_is_not_sanitized() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        write_file(&root.join("My Notes.v1").join("entry.md"), b"x");

        let api = MockApi::default();
        run_migration(&config(&root), &api).expect("run");
        assert_eq!(api.requests()[0].description, "My Notes.v1");
        assert!(root.join("My Notes.v1").is_dir());
    }

    #[test]
    fn worker_pool_keeps_traversal_order() {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        for category in ["Alpha", "Beta", "Gamma", "Delta"] {
            for file in ["one two.txt", "three.txt"] {
                write_file(&root.join(category).join(file), category.as_bytes());
            }
        }

        let sequential_root = temp.path().join("sequential");
        for category in ["Alpha", "Beta", "Gamma", "Delta"] {
            for file in ["one two.txt", "three.txt"] {
                write_file(&sequential_root.join(category).join(file), category.as_bytes());
            }
        }

        let mut parallel_config = config(&root);
        parallel_config.concurrency = 3;
        let api = MockApi::default();
        let parallel = run_migration(&parallel_config, &api).expect("parallel run");
        let sequential =
            run_migration(&config(&sequential_root), &MockApi::default()).expect("sequential run");

        let order = |report: &MigrationReport| -> Vec<(String, String)> {
            report
                .records
                .iter()
                .map(|record| (record.category.clone(), display_name(&record.source)))
                .collect()
        };
        assert_eq!(order(&parallel), order(&sequential));
        assert_eq!(parallel.created, 8);
        assert_eq!(parallel.renamed, 4);
        assert_eq!(api.requests().len(), 8);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_file_name_is_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("text");
        let dir = root.join("Notes");
        fs::create_dir_all(&dir).expect("create dir");
        let bad_name = OsStr::from_bytes(b"bad\xffname.txt");
        if fs::write(dir.join(bad_name), b"x").is_err() {
            // Some filesystems refuse non-UTF-8 names outright.
            return;
        }
        write_file(&dir.join("good.txt"), b"y");

        let api = MockApi::default();
        let report = run_migration(&config(&root), &api).expect("run");
        assert_eq!(report.skipped, 1);
        assert_eq!(report.created, 1);
        assert!(report.records.iter().any(|record| matches!(
            record.outcome,
            FileOutcome::Skipped {
                reason: SkipReason::NonUtf8Name
            }
        )));
    }
}
