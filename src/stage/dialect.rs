//! Optional dialect-mapping stage: regional Thai to standard Thai.
//!
//! Token-level lookup/substitution over built-in tables for the Northern,
//! Isan, and Southern dialects, optionally merged with caller-supplied
//! tables. Both the original and the mapped text are retained.

use crate::context::JobContext;
use crate::job::JobOptions;
use crate::stage::{Stage, StageError};
use std::collections::HashMap;
use std::path::Path;

/// Built-in dialect-to-standard token tables.
fn default_tables() -> HashMap<String, HashMap<String, String>> {
    let mut tables = HashMap::new();
    tables.insert(
        "north".to_string(),
        HashMap::from([
            ("ยะ".to_string(), "นะ".to_string()),
            ("กึ๊ด".to_string(), "คิด".to_string()),
            ("ละอ่อน".to_string(), "เด็ก".to_string()),
        ]),
    );
    tables.insert(
        "isan".to_string(),
        HashMap::from([
            ("อยู่จักได๋".to_string(), "อยู่ที่ไหน".to_string()),
            ("กินเข่า".to_string(), "กินข้าว".to_string()),
            ("เฮ็ด".to_string(), "ทำ".to_string()),
        ]),
    );
    tables.insert(
        "south".to_string(),
        HashMap::from([
            ("ม่ายหล่าว".to_string(), "ไม่หรอก".to_string()),
            ("เหลย".to_string(), "เลย".to_string()),
            ("แลน".to_string(), "วิ่ง".to_string()),
        ]),
    );
    tables
}

/// Maps dialect tokens to their standard-Thai equivalents.
#[derive(Debug, Clone)]
pub struct DialectMapper {
    tables: HashMap<String, HashMap<String, String>>,
}

impl Default for DialectMapper {
    fn default() -> Self {
        Self {
            tables: default_tables(),
        }
    }
}

impl DialectMapper {
    /// Merges a caller-supplied CSV table (`dialect,source,target` header)
    /// over the built-in tables. Rows with missing fields are skipped.
    pub fn load_csv(&mut self, path: &Path) -> std::io::Result<()> {
        let data = std::fs::read_to_string(path)?;
        for line in data.lines().skip(1) {
            let mut fields = line.splitn(3, ',');
            let (Some(region), Some(source), Some(target)) =
                (fields.next(), fields.next(), fields.next())
            else {
                continue;
            };
            let region = region.trim().to_lowercase();
            let source = source.trim();
            let target = target.trim();
            if region.is_empty() || source.is_empty() || target.is_empty() {
                continue;
            }
            self.tables
                .entry(region)
                .or_default()
                .insert(source.to_string(), target.to_string());
        }
        Ok(())
    }

    /// Maps whitespace-delimited tokens. With a region, only that region's
    /// table applies; otherwise the first matching table wins.
    pub fn map_text(&self, text: &str, region: Option<&str>) -> String {
        text.split_whitespace()
            .map(|token| self.map_token(token, region))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn map_token(&self, token: &str, region: Option<&str>) -> String {
        let replacement = match region {
            Some(region) => self
                .tables
                .get(&region.to_lowercase())
                .and_then(|table| table.get(token)),
            None => {
                // Deterministic table order keeps mapping reproducible.
                let mut regions: Vec<&String> = self.tables.keys().collect();
                regions.sort();
                regions
                    .into_iter()
                    .find_map(|r| self.tables.get(r).and_then(|table| table.get(token)))
            }
        };
        replacement.cloned().unwrap_or_else(|| token.to_string())
    }
}

pub struct DialectMapStage {
    mapper: DialectMapper,
}

impl DialectMapStage {
    pub fn new(mapper: DialectMapper) -> Self {
        Self { mapper }
    }
}

impl Stage for DialectMapStage {
    fn name(&self) -> &'static str {
        "dialect-map"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn enabled(&self, options: &JobOptions) -> bool {
        options.enable_dialect_map
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        let mapped: Vec<String> = ctx
            .segments
            .iter()
            .map(|segment| self.mapper.map_text(&segment.text, None))
            .collect();
        let joined = mapped
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        ctx.dialect_text = Some(joined);
        ctx.dialect_segment_texts = Some(mapped);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::SAMPLE_RATE;
    use crate::ingest::DecodedAudio;
    use crate::job::JobId;
    use crate::types::Segment;
    use std::io::Write;

    #[test]
    fn test_isan_tokens_mapped_to_standard() {
        let mapper = DialectMapper::default();
        assert_eq!(mapper.map_text("กินเข่า แล้ว", None), "กินข้าว แล้ว");
    }

    #[test]
    fn test_region_scoped_lookup() {
        let mapper = DialectMapper::default();
        assert_eq!(mapper.map_text("เฮ็ด", Some("isan")), "ทำ");
        // Wrong region: token passes through untouched.
        assert_eq!(mapper.map_text("เฮ็ด", Some("south")), "เฮ็ด");
    }

    #[test]
    fn test_unknown_tokens_pass_through() {
        let mapper = DialectMapper::default();
        assert_eq!(mapper.map_text("สวัสดีครับ", None), "สวัสดีครับ");
    }

    #[test]
    fn test_csv_rows_merge_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "dialect,source,target").unwrap();
        writeln!(file, "isan,สิเฮ็ด,จะทำ").unwrap();
        writeln!(file, "bad-row-without-commas").unwrap();

        let mut mapper = DialectMapper::default();
        mapper.load_csv(&path).unwrap();

        assert_eq!(mapper.map_text("สิเฮ็ด", Some("isan")), "จะทำ");
        // Built-ins survive the merge.
        assert_eq!(mapper.map_text("เฮ็ด", Some("isan")), "ทำ");
    }

    #[test]
    fn test_stage_retains_both_variants() {
        let audio = DecodedAudio {
            samples: vec![1i16; 16],
            sample_rate: SAMPLE_RATE,
            source_path: None,
        };
        let options = JobOptions {
            enable_dialect_map: true,
            ..JobOptions::default()
        };
        let mut ctx = JobContext::new(JobId::new(), options, audio);
        ctx.segments = vec![
            Segment::new(0.0, 1.0, "กินเข่า", 0.9),
            Segment::new(1.0, 2.0, "เฮ็ด งาน", 0.9),
        ];

        DialectMapStage::new(DialectMapper::default())
            .process(&mut ctx)
            .unwrap();

        // Originals untouched.
        assert_eq!(ctx.segments[0].text, "กินเข่า");
        let mapped = ctx.dialect_segment_texts.as_ref().unwrap();
        assert_eq!(mapped[0], "กินข้าว");
        assert_eq!(mapped[1], "ทำ งาน");
        assert_eq!(ctx.dialect_text.as_deref(), Some("กินข้าว ทำ งาน"));
        assert_ne!(ctx.dialect_text.as_deref().unwrap(), "กินเข่า เฮ็ด งาน");
    }
}
