//! Specfile XML parsing (§4.8): a thin tokenizing layer over `quick-xml`
//! that builds the [`Specfile`](super::model::Specfile) object model.
//! Malformed XML and permission-invariant violations are both reported as
//! [`AgError::InvalidSpecfile`] so a broken specfile never reaches the
//! reconciler.

use super::model::{parse_reval, FileEntry, Pair, Query, Specfile};
use crate::error::{AgError, AgResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashMap;

fn attr(tag: &BytesStart, name: &str) -> AgResult<Option<String>> {
    for a in tag.attributes() {
        let a = a.map_err(|e| AgError::InvalidSpecfile(e.to_string()))?;
        if a.key.as_ref() == name.as_bytes() {
            let raw = String::from_utf8_lossy(a.value.as_ref()).into_owned();
            return Ok(Some(raw.replace("&amp;", "&").replace("&quot;", "\"")));
        }
    }
    Ok(None)
}

fn required_attr(tag: &BytesStart, name: &str) -> AgResult<String> {
    attr(tag, name)?.ok_or_else(|| AgError::InvalidSpecfile(format!("missing '{name}' attribute")))
}

fn parse_perm(text: &str) -> AgResult<u32> {
    if let Some(octal) = text.strip_prefix('0') {
        if octal.is_empty() {
            return Ok(0);
        }
        return u32::from_str_radix(octal, 8)
            .map_err(|_| AgError::InvalidSpecfile(format!("malformed permission: {text}")));
    }
    text.parse().map_err(|_| AgError::InvalidSpecfile(format!("malformed permission: {text}")))
}

fn parse_u64(text: &str, field: &str) -> AgResult<u64> {
    text.parse().map_err(|_| AgError::InvalidSpecfile(format!("malformed {field}: {text}")))
}

/// Parses one `<File .../>` or `<Dir .../>` tag's common attributes.
fn parse_entry_attrs(tag: &BytesStart, is_dir: bool) -> AgResult<FileEntry> {
    Ok(FileEntry {
        path: required_attr(tag, "path")?,
        is_dir,
        driver: attr(tag, "driver")?.unwrap_or_default(),
        query_string: attr(tag, "query")?.unwrap_or_default(),
        file_perm: parse_perm(&attr(tag, "perm")?.unwrap_or_else(|| "0444".to_string()))?,
        coordinator_id: parse_u64(&attr(tag, "coordinator")?.unwrap_or_else(|| "0".to_string()), "coordinator")?,
        reval_sec: match attr(tag, "reval")? {
            Some(s) => parse_reval(&s)?,
            None => 0,
        },
    })
}

fn parse_query_attrs(tag: &BytesStart, dir_path: String) -> AgResult<Query> {
    Ok(Query {
        dir_path,
        driver: required_attr(tag, "driver")?,
        query_string: attr(tag, "query")?.unwrap_or_default(),
        file_perm: parse_perm(&attr(tag, "perm")?.unwrap_or_else(|| "0444".to_string()))?,
        coordinator_id: parse_u64(&attr(tag, "coordinator")?.unwrap_or_else(|| "0".to_string()), "coordinator")?,
        reval_sec: match attr(tag, "reval")? {
            Some(s) => parse_reval(&s)?,
            None => 0,
        },
    })
}

pub fn parse(xml: &str) -> AgResult<Specfile> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut specfile = Specfile::default();
    let mut dir_stack: Vec<String> = Vec::new();
    let mut in_config = false;

    loop {
        match reader.read_event().map_err(|e| AgError::InvalidSpecfile(e.to_string()))? {
            Event::Eof => break,
            Event::Start(tag) | Event::Empty(tag) => {
                let name = tag.name();
                let local = String::from_utf8_lossy(name.as_ref()).to_string();

                match local.as_str() {
                    "Specfile" => {
                        specfile.volume_id =
                            parse_u64(&required_attr(&tag, "volume_id")?, "volume_id")?;
                    }
                    "Config" => in_config = true,
                    "Pair" if in_config => {
                        let pair = Pair {
                            key: required_attr(&tag, "key")?,
                            value: attr(&tag, "value")?.unwrap_or_default(),
                        };
                        specfile.config.insert(pair.key, pair.value);
                    }
                    "File" => {
                        let entry = parse_entry_attrs(&tag, false)?;
                        specfile.files.push(entry);
                    }
                    "Dir" => {
                        let entry = parse_entry_attrs(&tag, true)?;
                        dir_stack.push(entry.path.clone());
                        specfile.files.push(entry);
                    }
                    "Query" => {
                        let dir_path = dir_stack
                            .last()
                            .cloned()
                            .ok_or_else(|| AgError::InvalidSpecfile("<Query> outside <Dir>".to_string()))?;
                        specfile.queries.push(parse_query_attrs(&tag, dir_path)?);
                    }
                    _ => {}
                }
            }
            Event::End(tag) => {
                let name = String::from_utf8_lossy(tag.name().as_ref()).to_string();
                match name.as_str() {
                    "Config" => in_config = false,
                    "Dir" => {
                        dir_stack.pop();
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    specfile.validate()?;
    Ok(specfile)
}

/// Builds the root-file map directly (without going through `<File>`
/// tags) for tests that just want a `HashMap<path, FileEntry>` view.
pub fn files_by_path(specfile: &Specfile) -> HashMap<String, &FileEntry> {
    specfile.files.iter().map(|f| (f.path.clone(), f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        <Specfile volume_id="1">
          <Config>
            <Pair key="cache_soft_limit" value="1048576"/>
          </Config>
          <File path="/readme.txt" driver="flat" query="doc=readme" perm="0444" coordinator="1" reval="1h"/>
          <Dir path="/data" driver="flat" perm="0555" coordinator="1" reval="1h">
            <Query driver="blob" query="bucket=data" perm="0444" coordinator="1" reval="10m"/>
          </Dir>
        </Specfile>
    "#;

    #[test]
    fn parses_files_dirs_queries_and_config() {
        let sf = parse(SAMPLE).unwrap();
        assert_eq!(sf.volume_id, 1);
        assert_eq!(sf.config.get("cache_soft_limit"), Some(&"1048576".to_string()));
        assert_eq!(sf.files.len(), 2);
        assert_eq!(sf.queries.len(), 1);
        assert_eq!(sf.queries[0].dir_path, "/data");
        assert_eq!(sf.queries[0].reval_sec, 600);
    }

    #[test]
    fn rejects_write_permission() {
        let xml = r#"<Specfile volume_id="1"><File path="/a" driver="d" perm="0644"/></Specfile>"#;
        assert!(parse(xml).is_err());
    }

    #[test]
    fn rejects_query_outside_dir() {
        let xml = r#"<Specfile volume_id="1"><Query driver="d" perm="0444"/></Specfile>"#;
        assert!(parse(xml).is_err());
    }
}
