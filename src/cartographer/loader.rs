//! Edge-list loading from JSON and CSV files.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::info;

use super::{Entity, VertexId};
use crate::error::{Error, Result};

/// Read an array of `{EntityId, Id1, Id2, Relation}` objects.
pub fn load_json(path: impl AsRef<Path>) -> Result<Vec<Entity>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let entities: Vec<Entity> = serde_json::from_reader(reader)?;

    info!("Loaded {} quotes from {}", entities.len(), path.display());
    Ok(entities)
}

/// Read headerless `id,origin,destination,rate` rows.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Entity>> {
    let path = path.as_ref();
    let entities = read_csv(File::open(path)?)?;

    info!("Loaded {} quotes from {}", entities.len(), path.display());
    Ok(entities)
}

pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Entity>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut entities = Vec::new();
    for record in rdr.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());

        // A trailing comma yields one extra empty field.
        let fields: Vec<&str> = match record.len() {
            4 => record.iter().collect(),
            5 if record.get(4) == Some("") => record.iter().take(4).collect(),
            n => {
                return Err(Error::Malformed {
                    line,
                    reason: format!("expected 4 fields, found {}", n),
                })
            }
        };

        entities.push(Entity::new(
            fields[0],
            parse_vertex(fields[1], line)?,
            parse_vertex(fields[2], line)?,
            fields[3].parse::<f64>().map_err(|e| Error::Malformed {
                line,
                reason: format!("rate '{}': {}", fields[3], e),
            })?,
        ));
    }
    Ok(entities)
}

fn parse_vertex(field: &str, line: u64) -> Result<VertexId> {
    field.parse().map_err(|e| Error::Malformed {
        line,
        reason: format!("vertex id '{}': {}", field, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_with_trailing_comma() {
        let data = "q1,1,2,2.0\nq2, 2 ,3,0.5,\n";
        let entities = read_csv(data.as_bytes()).unwrap();

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1], Entity::new("q2", 2, 3, 0.5));
    }

    #[test]
    fn test_read_csv_rejects_bad_rows() {
        assert!(matches!(
            read_csv("q1,1,2\n".as_bytes()),
            Err(Error::Malformed { line: 1, .. })
        ));
        assert!(matches!(
            read_csv("q1,1,2,2.0\nq2,x,3,1.0\n".as_bytes()),
            Err(Error::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn test_load_json_file() {
        let path = std::env::temp_dir().join(format!("kspa_loader_{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"EntityId":"a","Id1":1,"Id2":2,"Relation":"2.5"},{"EntityId":"b","Id1":2,"Id2":1,"Relation":0.5}]"#,
        )
        .unwrap();

        let entities = load_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(entities, vec![Entity::new("a", 1, 2, 2.5), Entity::new("b", 2, 1, 0.5)]);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        assert!(matches!(load_csv("/nonexistent/kspa.csv"), Err(Error::Io(_))));
    }
}
