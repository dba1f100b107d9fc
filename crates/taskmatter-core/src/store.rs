use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, anyhow, bail};
use rand::Rng;
use regex::Regex;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::record::{IDENTIFIER_KEY, PATH_KEY, Record, TITLE_KEY};

pub const TASK_EXTENSIONS: [&str; 4] = ["md", "pmd", "rmd", "Rmd"];
const PROPERTIES_KEY: &str = "_tm";
const DELIMITER: &str = "---";
const ID_ATTEMPTS: usize = 10_000;

/// Title and identifier encoded in a task file name, `Title | abc.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskName {
    pub title: String,
    pub identifier: String,
}

fn task_name_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?P<title>.*) \| (?P<id>[a-z]{3})$").ok())
        .as_ref()
}

pub fn is_identifier(token: &str) -> bool {
    token.len() == 3 && token.bytes().all(|b| b.is_ascii_lowercase())
}

pub fn parse_task_name(path: &Path) -> Option<TaskName> {
    let ext = path.extension()?.to_str()?;
    if !TASK_EXTENSIONS.contains(&ext) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let caps = task_name_re()?.captures(stem)?;
    Some(TaskName {
        title: caps["title"].to_string(),
        identifier: caps["id"].to_string(),
    })
}

/// Files under `paths`. Files named directly are always kept; directories
/// are walked in name order, descending into subdirectories only when
/// `recursive` is set. Symlinked directories are never descended into.
#[tracing::instrument]
pub fn discover(paths: &[PathBuf], recursive: bool) -> anyhow::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for path in paths {
        if path.is_file() {
            found.push(path.clone());
        } else if path.is_dir() {
            walk_dir(path, recursive, &mut found)?;
        } else {
            warn!(path = %path.display(), "search path does not exist; skipping");
        }
    }
    debug!(count = found.len(), "discovered files");
    Ok(found)
}

fn walk_dir(dir: &Path, recursive: bool, found: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read directory {}", dir.display()))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<_, _>>()
        .with_context(|| format!("failed to list {}", dir.display()))?;
    entries.sort();

    for entry in entries {
        if entry.is_dir() {
            let linked = fs::symlink_metadata(&entry)
                .with_context(|| format!("failed to stat {}", entry.display()))?
                .file_type()
                .is_symlink();
            if linked {
                debug!(dir = %entry.display(), "skipping symlinked directory");
            } else if recursive {
                walk_dir(&entry, recursive, found)?;
            }
        } else {
            found.push(entry);
        }
    }
    Ok(())
}

/// Task files under `paths` whose name carries `identifier`.
pub fn find_by_identifier(
    paths: &[PathBuf],
    recursive: bool,
    identifier: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    Ok(load_records(paths, recursive)?
        .iter()
        .filter(|record| record.identifier() == identifier)
        .filter_map(Record::path)
        .map(PathBuf::from)
        .collect())
}

/// Where a command line target points: a task id when it looks like one and
/// matches a file, otherwise an existing path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Found(PathBuf),
    UnknownIdentifier(String),
    MissingPath(PathBuf),
}

#[tracing::instrument]
pub fn resolve_target(paths: &[PathBuf], recursive: bool, target: &str) -> anyhow::Result<Target> {
    if is_identifier(target) {
        if let Some(found) = find_by_identifier(paths, recursive, target)?.into_iter().next() {
            return Ok(Target::Found(found));
        }
        if !Path::new(target).is_file() {
            return Ok(Target::UnknownIdentifier(target.to_string()));
        }
    }
    let path = PathBuf::from(target);
    if path.is_file() {
        Ok(Target::Found(path))
    } else {
        Ok(Target::MissingPath(path))
    }
}

/// Records for every task file under `paths`.
#[tracing::instrument]
pub fn load_records(paths: &[PathBuf], recursive: bool) -> anyhow::Result<Vec<Record>> {
    let mut records = Vec::new();
    for path in discover(paths, recursive)? {
        let Some(name) = parse_task_name(&path) else {
            continue;
        };
        match read_record(&path, name) {
            Ok(record) => records.push(record),
            Err(err) => {
                warn!(file = %path.display(), error = %err, "skipping unreadable task file");
            }
        }
    }
    info!(count = records.len(), "loaded task records");
    Ok(records)
}

/// Reads the `_tm` front matter properties of one task file. Front matter
/// that does not parse is logged and treated as empty.
pub fn read_record(path: &Path, name: TaskName) -> anyhow::Result<Record> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

    let mut record = Record::default();
    match front_matter_properties(&content) {
        Ok(Some(props)) => {
            for (key, value) in props {
                record.insert(&key, value);
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!(file = %path.display(), error = %err, "ignoring unreadable front matter");
        }
    }

    record.insert(PATH_KEY, path.to_string_lossy().to_string());
    record.insert(TITLE_KEY, name.title);
    record.insert(IDENTIFIER_KEY, name.identifier);
    Ok(record)
}

fn front_matter_properties(content: &str) -> anyhow::Result<Option<serde_json::Map<String, Value>>> {
    let (Some(yaml), _) = split_front_matter(content) else {
        return Ok(None);
    };
    if yaml.trim().is_empty() {
        return Ok(None);
    }
    let parsed: Value = serde_yaml::from_str(yaml).context("YAML parse error")?;
    match parsed {
        Value::Object(mut map) => match map.remove(PROPERTIES_KEY) {
            Some(Value::Object(props)) => Ok(Some(props)),
            _ => Ok(None),
        },
        _ => Ok(None),
    }
}

/// Splits `---` delimited front matter from the body. Returns no front
/// matter when the opening or closing delimiter is missing.
pub fn split_front_matter(content: &str) -> (Option<&str>, &str) {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return (None, content);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == DELIMITER {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, content)
}

/// Sets `_tm.done: true`, keeping every other front matter key and the body.
#[tracing::instrument]
pub fn mark_done(path: &Path) -> anyhow::Result<()> {
    let content =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let (yaml, body) = split_front_matter(&content);

    let mut front: serde_yaml::Mapping = match yaml {
        Some(yaml) if !yaml.trim().is_empty() => serde_yaml::from_str(yaml)
            .with_context(|| format!("failed to parse front matter of {}", path.display()))?,
        _ => serde_yaml::Mapping::new(),
    };

    let key = serde_yaml::Value::from(PROPERTIES_KEY);
    let done = (serde_yaml::Value::from("done"), serde_yaml::Value::Bool(true));
    match front.get_mut(&key) {
        Some(serde_yaml::Value::Mapping(props)) => {
            props.insert(done.0, done.1);
        }
        None | Some(serde_yaml::Value::Null) => {
            let mut props = serde_yaml::Mapping::new();
            props.insert(done.0, done.1);
            front.insert(key, serde_yaml::Value::Mapping(props));
        }
        Some(_) => bail!("{} contains unsupported `{PROPERTIES_KEY}` key", path.display()),
    }

    write_task_file(path, &front, body)?;
    info!(file = %path.display(), "marked task done");
    Ok(())
}

/// Creates `<dir>/<title> | <id>.md` with the given `_tm` properties and a
/// level 1 heading body. The id is random and unused among the task files
/// directly inside `dir`.
#[tracing::instrument(skip(props))]
pub fn create_task(
    dir: &Path,
    title: &str,
    props: serde_json::Map<String, Value>,
) -> anyhow::Result<(PathBuf, String)> {
    if title.trim().is_empty() {
        bail!("task title cannot be empty");
    }
    if title.contains(['/', '\\']) {
        bail!("task title cannot contain path separators: {title}");
    }

    let taken: BTreeSet<String> = discover(&[dir.to_path_buf()], false)?
        .iter()
        .filter_map(|path| parse_task_name(path))
        .map(|name| name.identifier)
        .collect();

    let mut rng = rand::thread_rng();
    let identifier = (0..ID_ATTEMPTS)
        .map(|_| random_identifier(&mut rng))
        .find(|candidate| !taken.contains(candidate))
        .ok_or_else(|| anyhow!("no unused task identifier left in {}", dir.display()))?;

    let path = dir.join(format!("{title} | {identifier}.md"));
    if path.exists() {
        bail!("{} already exists", path.display());
    }

    let props = if props.is_empty() {
        serde_yaml::Value::Null
    } else {
        serde_yaml::to_value(Value::Object(props)).context("failed to encode task properties")?
    };
    let mut front = serde_yaml::Mapping::new();
    front.insert(serde_yaml::Value::from(PROPERTIES_KEY), props);

    write_task_file(&path, &front, &format!("\n# {title}\n"))?;
    info!(file = %path.display(), identifier = %identifier, "created task");
    Ok((path, identifier))
}

pub fn random_identifier<R: Rng>(rng: &mut R) -> String {
    (0..3).map(|_| char::from(rng.gen_range(b'a'..=b'z'))).collect()
}

fn write_task_file(path: &Path, front: &serde_yaml::Mapping, body: &str) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(front).context("failed to encode front matter")?;
    debug!(file = %path.display(), "writing task file atomically");

    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file for {}", path.display()))?;
    write!(temp, "{DELIMITER}\n{yaml}{DELIMITER}\n{body}")
        .and_then(|()| temp.flush())
        .with_context(|| format!("failed to write {}", path.display()))?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use serde_json::json;
    use tempfile::tempdir;

    use super::{
        TaskName, Target, create_task, discover, find_by_identifier, is_identifier, load_records,
        mark_done, parse_task_name, random_identifier, resolve_target, split_front_matter,
    };

    #[test]
    fn task_names_need_id_suffix_and_extension() {
        assert_eq!(
            parse_task_name(Path::new("notes/Write report | abc.md")),
            Some(TaskName {
                title: "Write report".to_string(),
                identifier: "abc".to_string(),
            })
        );
        assert!(parse_task_name(Path::new("A | b | xyz.Rmd")).is_some());
        assert!(parse_task_name(Path::new("Write report | ABC.md")).is_none());
        assert!(parse_task_name(Path::new("Write report | abcd.md")).is_none());
        assert!(parse_task_name(Path::new("Write report | abc.txt")).is_none());
        assert!(parse_task_name(Path::new("README.md")).is_none());
        assert!(is_identifier("abc"));
        assert!(!is_identifier("ab1"));
    }

    #[test]
    fn splits_front_matter() {
        let (yaml, body) = split_front_matter("---\na: 1\n---\n# Title\n");
        assert_eq!(yaml, Some("a: 1\n"));
        assert_eq!(body, "# Title\n");

        let (yaml, body) = split_front_matter("# Only body\n");
        assert_eq!(yaml, None);
        assert_eq!(body, "# Only body\n");

        let (yaml, _) = split_front_matter("---\na: 1\nno closing\n");
        assert_eq!(yaml, None);
    }

    #[test]
    fn discovery_respects_recursion() {
        let temp = tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("sub")).expect("mkdir");
        fs::write(temp.path().join("Top | top.md"), "").expect("write");
        fs::write(temp.path().join("sub").join("Deep | dep.md"), "").expect("write");

        let flat = discover(&[temp.path().to_path_buf()], false).expect("discover");
        assert_eq!(flat.len(), 1);
        let deep = discover(&[temp.path().to_path_buf()], true).expect("discover");
        assert_eq!(deep.len(), 2);
    }

    #[test]
    fn loads_properties_and_name() {
        let temp = tempdir().expect("tempdir");
        fs::write(
            temp.path().join("Pay rent | rnt.md"),
            "---\n_tm:\n  planned: January 5, 2026\n  done: false\nauthor: me\n---\n# Pay rent\n",
        )
        .expect("write");
        fs::write(temp.path().join("Bad | bad.md"), "---\n_tm: [unclosed\n---\n").expect("write");
        fs::write(temp.path().join("Plain | pln.md"), "no front matter").expect("write");
        fs::write(temp.path().join("notes.md"), "---\n_tm:\n  done: true\n---\n").expect("write");

        let records = load_records(&[temp.path().to_path_buf()], false).expect("load");
        assert_eq!(records.len(), 3);

        let rent = records
            .iter()
            .find(|r| r.identifier() == "rnt")
            .expect("rent record");
        assert_eq!(rent.title(), "Pay rent");
        assert_eq!(rent.planned().as_deref(), Some("January 5, 2026"));
        assert!(!rent.is_done());
        assert!(rent.get("author").is_none());
        assert!(rent.path().is_some_and(|p| p.ends_with("Pay rent | rnt.md")));

        let bad = records.iter().find(|r| r.identifier() == "bad").expect("bad record");
        assert_eq!(bad.title(), "Bad");
        assert_eq!(bad.date_text(), None);
    }

    #[test]
    fn mark_done_keeps_other_keys_and_body() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Call mom | mom.md");
        fs::write(
            &path,
            "---\nauthor: me\n_tm:\n  due: friday\n---\n# Call mom\n\nRemember the cake.\n",
        )
        .expect("write");

        mark_done(&path).expect("mark done");
        let content = fs::read_to_string(&path).expect("read back");
        assert!(content.ends_with("# Call mom\n\nRemember the cake.\n"));

        let (yaml, _) = split_front_matter(&content);
        let front: serde_json::Value =
            serde_yaml::from_str(yaml.expect("front matter")).expect("yaml");
        assert_eq!(front["author"], json!("me"));
        assert_eq!(front["_tm"]["due"], json!("friday"));
        assert_eq!(front["_tm"]["done"], json!(true));
    }

    #[test]
    fn mark_done_without_front_matter() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Bare | bar.md");
        fs::write(&path, "# Bare\n").expect("write");

        mark_done(&path).expect("mark done");
        let content = fs::read_to_string(&path).expect("read back");
        assert!(content.starts_with("---\n_tm:\n  done: true\n---\n"));
        assert!(content.ends_with("# Bare\n"));
    }

    #[test]
    fn mark_done_rejects_scalar_properties() {
        let temp = tempdir().expect("tempdir");
        let path = temp.path().join("Odd | odd.md");
        fs::write(&path, "---\n_tm: 5\n---\n").expect("write");
        assert!(mark_done(&path).is_err());
    }

    #[test]
    fn create_task_writes_front_matter() {
        let temp = tempdir().expect("tempdir");
        let mut props = serde_json::Map::new();
        props.insert("due".to_string(), json!("January 9, 2026"));

        let (path, identifier) = create_task(temp.path(), "Buy milk", props).expect("create");
        assert!(is_identifier(&identifier));
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(format!("Buy milk | {identifier}.md").as_str())
        );
        let content = fs::read_to_string(&path).expect("read");
        assert_eq!(content, "---\n_tm:\n  due: January 9, 2026\n---\n\n# Buy milk\n");

        let (path, _) =
            create_task(temp.path(), "Empty", serde_json::Map::new()).expect("create");
        let content = fs::read_to_string(&path).expect("read");
        assert!(content.starts_with("---\n_tm: null\n---\n"));

        assert!(create_task(temp.path(), "a/b", serde_json::Map::new()).is_err());
    }

    #[test]
    fn random_identifiers_are_lowercase_triples() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            assert!(is_identifier(&random_identifier(&mut rng)));
        }
    }

    #[test]
    fn targets_resolve_by_id_or_path() {
        let temp = tempdir().expect("tempdir");
        let paths = vec![temp.path().to_path_buf()];
        let task = temp.path().join("Walk dog | dog.md");
        fs::write(&task, "").expect("write");

        assert_eq!(
            resolve_target(&paths, false, "dog").expect("resolve"),
            Target::Found(task.clone())
        );
        assert_eq!(
            resolve_target(&paths, false, "cat").expect("resolve"),
            Target::UnknownIdentifier("cat".to_string())
        );
        let as_path = task.to_string_lossy().to_string();
        assert_eq!(
            resolve_target(&paths, false, &as_path).expect("resolve"),
            Target::Found(task)
        );
        assert!(matches!(
            resolve_target(&paths, false, "nowhere/file.md").expect("resolve"),
            Target::MissingPath(_)
        ));
    }

    #[test]
    fn unreadable_task_files_are_skipped() {
        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("Bin | bin.md"), [0xff_u8, 0xfe, 0x00]).expect("write");
        fs::write(temp.path().join("Text | txt.md"), "# Text\n").expect("write");

        let records = load_records(&[temp.path().to_path_buf()], false).expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identifier(), "txt");
    }

    #[test]
    fn write_failures_name_the_task_file() {
        let temp = tempdir().expect("tempdir");
        let missing = temp.path().join("gone");

        let err = create_task(&missing, "Lost", serde_json::Map::new()).expect_err("no directory");
        let message = format!("{err:#}");
        assert!(message.contains("failed to create temp file for"), "{message}");
        assert!(message.contains("Lost | "), "{message}");
    }

    #[cfg(unix)]
    #[test]
    fn recursive_discovery_ignores_directory_symlinks() {
        use std::os::unix::fs::symlink;

        let temp = tempdir().expect("tempdir");
        fs::write(temp.path().join("Only | one.md"), "").expect("write");
        symlink(".", temp.path().join("loop")).expect("symlink");

        let records = load_records(&[temp.path().to_path_buf()], true).expect("load");
        assert_eq!(records.len(), 1);
        assert_eq!(
            find_by_identifier(&[temp.path().to_path_buf()], true, "one")
                .expect("find")
                .len(),
            1
        );
    }
}
