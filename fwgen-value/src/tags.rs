// YAML reading with loader tags
// `!secret`, `!include`, `!include_dir_*`, `!env_var` and `!lambda` are
// resolved while the raw tree is converted. File arguments are relative to
// the directory of the file holding the tag.

use crate::document::LoadError;
use crate::{Mapping, Value};
use serde_yaml::value::TaggedValue;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Secrets file looked up next to the file using `!secret`
pub const SECRETS_FILE: &str = "secrets.yaml";

const ROOT: &str = "<root>";

pub(crate) struct Reader {
    /// Parsed secrets files, by path
    secrets: HashMap<PathBuf, Mapping>,
    /// Files being read, innermost last
    stack: Vec<PathBuf>,
}

impl Reader {
    pub fn new() -> Self {
        Self {
            secrets: HashMap::new(),
            stack: Vec::new(),
        }
    }

    pub fn parse(&mut self, source: &str, dir: &Path) -> Result<Value, LoadError> {
        self.parse_at(source, dir, ROOT)
    }

    pub fn read_file(&mut self, path: &Path) -> Result<Value, LoadError> {
        self.read_at(path, ROOT)
    }

    /// An empty file reads as an empty mapping
    fn read_at(&mut self, path: &Path, location: &str) -> Result<Value, LoadError> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.stack.contains(&key) {
            return Err(LoadError::IncludeCycle {
                path: path.to_path_buf(),
            });
        }
        let source = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        self.stack.push(key);
        let value = self.parse_at(&source, &dir, location);
        self.stack.pop();

        match value? {
            Value::Null => Ok(Value::Map(Mapping::new())),
            value => Ok(value),
        }
    }

    fn parse_at(&mut self, source: &str, dir: &Path, location: &str) -> Result<Value, LoadError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(source)?;
        self.convert(raw, dir, location)
    }

    fn convert(&mut self, raw: serde_yaml::Value, dir: &Path, location: &str) -> Result<Value, LoadError> {
        Ok(match raw {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    // u64 beyond i64 range and real numbers
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::String(s),
            serde_yaml::Value::Sequence(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.into_iter().enumerate() {
                    out.push(self.convert(item, dir, &format!("{}[{}]", location, i))?);
                }
                Value::List(out)
            }
            serde_yaml::Value::Mapping(map) => {
                let mut out = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    let key = scalar_key(key, location)?;
                    if out.contains_key(&key) {
                        return Err(LoadError::DuplicateKey {
                            key,
                            location: location.to_string(),
                        });
                    }
                    let child = child_location(location, &key);
                    let value = self.convert(value, dir, &child)?;
                    out.insert(key, value);
                }
                Value::Map(out)
            }
            serde_yaml::Value::Tagged(tagged) => self.resolve(*tagged, dir, location)?,
        })
    }

    fn resolve(&mut self, tagged: TaggedValue, dir: &Path, location: &str) -> Result<Value, LoadError> {
        let tag = tagged.tag.to_string();
        let name = tag.trim_start_matches('!');
        let known = [
            "lambda",
            "secret",
            "env_var",
            "include",
            "include_dir_list",
            "include_dir_merge_list",
            "include_dir_named",
            "include_dir_merge_named",
        ];
        if !known.contains(&name) {
            return Err(LoadError::UnsupportedTag {
                tag,
                location: location.to_string(),
            });
        }

        let argument = tag_argument(&tag, tagged.value, location)?;
        match name {
            "lambda" => Ok(Value::Lambda(argument)),
            "secret" => self.secret(&argument, dir, location),
            "env_var" => env_var(&argument, location),
            "include" => self.read_at(&dir.join(&argument), location),
            "include_dir_list" => {
                let mut out = Vec::new();
                for (i, file) in yaml_files(&dir.join(&argument))?.iter().enumerate() {
                    out.push(self.read_at(file, &format!("{}[{}]", location, i))?);
                }
                Ok(Value::List(out))
            }
            "include_dir_merge_list" => {
                let mut out = Vec::new();
                for file in yaml_files(&dir.join(&argument))? {
                    if let Value::List(items) = self.read_at(&file, location)? {
                        out.extend(items);
                    }
                }
                Ok(Value::List(out))
            }
            "include_dir_named" => {
                let mut out = Mapping::new();
                for file in yaml_files(&dir.join(&argument))? {
                    let stem = file
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();
                    let value = self.read_at(&file, &child_location(location, &stem))?;
                    out.insert(stem, value);
                }
                Ok(Value::Map(out))
            }
            _ => {
                let mut out = Mapping::new();
                for file in yaml_files(&dir.join(&argument))? {
                    if let Value::Map(entries) = self.read_at(&file, location)? {
                        out.extend(entries);
                    }
                }
                Ok(Value::Map(out))
            }
        }
    }

    fn secret(&mut self, name: &str, dir: &Path, location: &str) -> Result<Value, LoadError> {
        let path = dir.join(SECRETS_FILE);
        if !self.secrets.contains_key(&path) {
            let secrets = match self.read_at(&path, SECRETS_FILE)? {
                Value::Map(secrets) => secrets,
                other => {
                    return Err(LoadError::SecretsNotAMapping {
                        path,
                        found: other.type_name(),
                    })
                }
            };
            self.secrets.insert(path.clone(), secrets);
        }
        self.secrets
            .get(&path)
            .and_then(|secrets| secrets.get(name))
            .cloned()
            .ok_or_else(|| LoadError::UndefinedSecret {
                name: name.to_string(),
                location: location.to_string(),
            })
    }
}

/// `NAME` or `NAME default words`
fn env_var(argument: &str, location: &str) -> Result<Value, LoadError> {
    let mut words = argument.split_whitespace();
    let name = words.next().unwrap_or_default();
    let default: Vec<&str> = words.collect();
    match std::env::var(name) {
        Ok(value) => Ok(Value::String(value)),
        Err(_) if !default.is_empty() => Ok(Value::String(default.join(" "))),
        Err(_) => Err(LoadError::UndefinedEnvVar {
            name: name.to_string(),
            location: location.to_string(),
        }),
    }
}

fn tag_argument(tag: &str, value: serde_yaml::Value, location: &str) -> Result<String, LoadError> {
    match value {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err(LoadError::TagArgument {
            tag: tag.to_string(),
            location: location.to_string(),
        }),
    }
}

/// `*.yaml` files below `dir` in path order, skipping hidden entries and
/// the secrets file
fn yaml_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut found = Vec::new();
    collect_yaml_files(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn collect_yaml_files(dir: &Path, found: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let io = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if path.is_dir() {
            collect_yaml_files(&path, found)?;
        } else if name.ends_with(".yaml") && name != SECRETS_FILE {
            found.push(path);
        }
    }
    Ok(())
}

fn scalar_key(key: serde_yaml::Value, location: &str) -> Result<String, LoadError> {
    match key {
        serde_yaml::Value::String(s) => Ok(s),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        _ => Err(LoadError::NonScalarKey(location.to_string())),
    }
}

fn child_location(parent: &str, key: &str) -> String {
    if parent == ROOT {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    fn read(path: &Path) -> Result<Value, LoadError> {
        Reader::new().read_file(path)
    }

    fn entry<'a>(value: &'a Value, key: &str) -> &'a Value {
        value.as_map().and_then(|m| m.get(key)).unwrap()
    }

    #[test]
    fn test_secret_resolves_next_to_document() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SECRETS_FILE, "wifi_pw: hunter22\n");
        let node = write(dir.path(), "node.yaml", "wifi:\n  password: !secret wifi_pw\n");

        let value = read(&node).unwrap();
        assert_eq!(entry(entry(&value, "wifi"), "password"), &Value::from("hunter22"));
    }

    #[test]
    fn test_missing_secret_names_location() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), SECRETS_FILE, "other: x\n");
        let node = write(dir.path(), "node.yaml", "wifi:\n  password: !secret wifi_pw\n");

        match read(&node).unwrap_err() {
            LoadError::UndefinedSecret { name, location } => {
                assert_eq!(name, "wifi_pw");
                assert_eq!(location, "wifi.password");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_secrets_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let node = write(dir.path(), "node.yaml", "password: !secret wifi_pw\n");
        let err = read(&node).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
        assert!(err.to_string().contains(SECRETS_FILE));
    }

    #[test]
    fn test_include_resolves_relative_to_including_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "common/secrets.yaml", "key: nested\n");
        write(dir.path(), "common/wifi.yaml", "ssid: home\npassword: !secret key\n");
        let node = write(dir.path(), "node.yaml", "wifi: !include common/wifi.yaml\n");

        let value = read(&node).unwrap();
        let wifi = entry(&value, "wifi");
        assert_eq!(entry(wifi, "ssid"), &Value::from("home"));
        assert_eq!(entry(wifi, "password"), &Value::from("nested"));
    }

    #[test]
    fn test_include_cycle_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.yaml", "b: !include b.yaml\n");
        write(dir.path(), "b.yaml", "a: !include a.yaml\n");
        let err = read(&dir.path().join("a.yaml")).unwrap_err();
        assert!(matches!(err, LoadError::IncludeCycle { .. }), "{err}");
    }

    #[test]
    fn test_include_dir_variants() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "parts/b.yaml", "- platform: two\n");
        write(dir.path(), "parts/a.yaml", "- platform: one\n");
        write(dir.path(), "parts/.hidden.yaml", "- platform: hidden\n");
        write(dir.path(), "parts/secrets.yaml", "- platform: secret\n");
        write(dir.path(), "named/uart.yaml", "baud_rate: 9600\n");
        write(dir.path(), "named/i2c.yaml", "scan: true\n");
        let node = write(
            dir.path(),
            "node.yaml",
            "list: !include_dir_list parts\n\
             merged: !include_dir_merge_list parts\n\
             named: !include_dir_named named\n\
             flat: !include_dir_merge_named named\n",
        );

        let value = read(&node).unwrap();
        let Value::List(list) = entry(&value, "list") else {
            panic!("expected a list");
        };
        assert_eq!(list.len(), 2);
        assert!(matches!(&list[0], Value::List(items) if items.len() == 1));

        let Value::List(merged) = entry(&value, "merged") else {
            panic!("expected a list");
        };
        let platforms: Vec<&Value> = merged.iter().map(|item| entry(item, "platform")).collect();
        assert_eq!(platforms, vec![&Value::from("one"), &Value::from("two")]);

        let named = entry(&value, "named").as_map().unwrap();
        let keys: Vec<&str> = named.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["i2c", "uart"]);

        let flat = entry(&value, "flat");
        assert_eq!(entry(flat, "baud_rate"), &Value::Int(9600));
        assert_eq!(entry(flat, "scan"), &Value::Bool(true));
    }

    #[test]
    fn test_env_var_with_default_and_missing() {
        std::env::set_var("FWGEN_TAGS_TEST_SSID", "attic");
        let value = Reader::new()
            .parse(
                "a: !env_var FWGEN_TAGS_TEST_SSID\nb: !env_var FWGEN_TAGS_TEST_UNSET fall back\n",
                Path::new("."),
            )
            .unwrap();
        assert_eq!(entry(&value, "a"), &Value::from("attic"));
        assert_eq!(entry(&value, "b"), &Value::from("fall back"));

        let err = Reader::new()
            .parse("c: !env_var FWGEN_TAGS_TEST_UNSET\n", Path::new("."))
            .unwrap_err();
        match err {
            LoadError::UndefinedEnvVar { name, location } => {
                assert_eq!(name, "FWGEN_TAGS_TEST_UNSET");
                assert_eq!(location, "c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tag_needs_scalar_argument() {
        let err = Reader::new()
            .parse("a: !include [x, y]\n", Path::new("."))
            .unwrap_err();
        assert!(matches!(err, LoadError::TagArgument { .. }));
    }
}
