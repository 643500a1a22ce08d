//! Input table parsing.

use vharvest_models::LinkRecord;

use crate::error::{WorkerError, WorkerResult};

/// Header row every uploaded table must carry, in this order.
pub const EXPECTED_HEADERS: [&str; 2] = ["idTag", "YoutubeLink"];

/// Parse an uploaded `idTag,YoutubeLink` table.
///
/// Rows are returned in input order. Link cells are not validated here:
/// blank or malformed links are kept and later classified invalid by the
/// pipeline.
pub fn parse_link_table(text: &str) -> WorkerResult<Vec<LinkRecord>> {
    let text = text.trim_start_matches('\u{feff}');

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let header_names: Vec<&str> = headers.iter().collect();
    if header_names != EXPECTED_HEADERS {
        return Err(WorkerError::invalid_table(format!(
            "expected headers {}, got {}",
            EXPECTED_HEADERS.join(","),
            header_names.join(",")
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let id_tag = record.get(0).unwrap_or_default();
        let link = record.get(1).unwrap_or_default();
        if id_tag.is_empty() && link.is_empty() {
            continue;
        }
        rows.push(LinkRecord::new(id_tag, link));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_rows_in_order() {
        let rows = parse_link_table(
            "idTag,YoutubeLink\nA1,https://www.youtube.com/watch?v=dQw4w9WgXcQ\nB2,https://youtu.be/dQw4w9WgXcQ\n",
        )
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id_tag, "A1");
        assert_eq!(rows[1].source_url, "https://youtu.be/dQw4w9WgXcQ");
    }

    #[test]
    fn test_rejects_wrong_headers() {
        let err = parse_link_table("id,link\nA,https://x\n").unwrap_err();
        assert!(matches!(err, WorkerError::InvalidTable(_)));

        let err = parse_link_table("YoutubeLink,idTag\n").unwrap_err();
        assert!(matches!(err, WorkerError::InvalidTable(_)));
    }

    #[test]
    fn test_keeps_blank_links() {
        let rows = parse_link_table("\u{feff}idTag,YoutubeLink\nA1,\nB2\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].source_url, "");
        assert_eq!(rows[1].source_url, "");
    }

    #[test]
    fn test_header_only_table_is_empty() {
        assert!(parse_link_table("idTag,YoutubeLink\n").unwrap().is_empty());
    }
}
