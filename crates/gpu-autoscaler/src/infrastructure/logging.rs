//! provides logging helpers
//!
//! Events whose target starts with `metrics.` are capacity/actuation records.
//! With a metrics file configured they are written there as InfluxDB lines
//! (measurement = target without the prefix, `tag_*` fields become tags);
//! they never reach the human-readable log.

use std::collections::BTreeMap;
use std::fmt::{self};
use std::path::Path;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use anyhow::Context;
use influxdb_line_protocol::LineProtocolBuilder;
use tracing::field::Field;
use tracing::field::Visit;
use tracing::Event;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::filter::FilterExt;
use tracing_subscriber::filter::{self};
use tracing_subscriber::fmt::format;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::FormatEvent;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

const METRICS_TARGET_PREFIX: &str = "metrics.";

struct InfluxDBFormatter;

/// A field value as recorded from a tracing event.
#[derive(Debug, Clone, PartialEq)]
enum FieldValue {
    Integer(i64),
    UnsignedInteger(u64),
    Boolean(bool),
    String(String),
}

#[derive(Default)]
struct FieldVisitor {
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
}

impl FieldVisitor {
    fn insert_tag(&mut self, tag: &str, value: &str) {
        // line protocol cannot end a tag value with a backslash
        self.tags
            .insert(tag.to_string(), value.trim_end_matches('\\').to_string());
    }

    fn insert(&mut self, field: &Field, value: FieldValue) {
        match field.name().strip_prefix("tag_") {
            Some(tag) => {
                let value = match value {
                    FieldValue::Integer(v) => v.to_string(),
                    FieldValue::UnsignedInteger(v) => v.to_string(),
                    FieldValue::Boolean(v) => v.to_string(),
                    FieldValue::String(v) => v,
                };
                self.insert_tag(tag, &value);
            }
            None if field.name() == "message" => {}
            None => {
                self.fields.insert(field.name().to_string(), value);
            }
        }
    }
}

impl Visit for FieldVisitor {
    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, FieldValue::Integer(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, FieldValue::UnsignedInteger(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, FieldValue::Boolean(value));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, FieldValue::String(value.to_string()));
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        // `%value` fields arrive here
        self.insert(field, FieldValue::String(format!("{value:?}")));
    }
}

/// Encode one line, or `None` for an event without fields.
fn encode_line(
    measurement: &str,
    tags: &BTreeMap<String, String>,
    fields: &BTreeMap<String, FieldValue>,
    timestamp_nanos: i64,
) -> Option<String> {
    let mut fields = fields.iter();
    let (first_key, first_value) = fields.next()?;

    let mut builder = LineProtocolBuilder::new().measurement(measurement);
    for (key, value) in tags {
        builder = builder.tag(key, value);
    }

    let mut builder = match first_value {
        FieldValue::Integer(i) => builder.field(first_key, *i),
        FieldValue::UnsignedInteger(u) => builder.field(first_key, *u),
        FieldValue::Boolean(b) => builder.field(first_key, *b),
        FieldValue::String(s) => builder.field(first_key, s.as_str()),
    };
    for (key, value) in fields {
        builder = match value {
            FieldValue::Integer(i) => builder.field(key, *i),
            FieldValue::UnsignedInteger(u) => builder.field(key, *u),
            FieldValue::Boolean(b) => builder.field(key, *b),
            FieldValue::String(s) => builder.field(key, s.as_str()),
        };
    }

    String::from_utf8(builder.timestamp(timestamp_nanos).close_line().build()).ok()
}

impl<S, N> FormatEvent<S, N> for InfluxDBFormatter
where
    S: Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let target = event.metadata().target();
        let measurement = target.strip_prefix(METRICS_TARGET_PREFIX).unwrap_or(target);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_nanos()).unwrap_or(i64::MAX))
            .unwrap_or_default();

        match encode_line(measurement, &visitor.tags, &visitor.fields, timestamp) {
            Some(line) => write!(writer, "{line}"),
            None => Ok(()),
        }
    }
}

fn is_metrics_target(target: &str) -> bool {
    target.starts_with(METRICS_TARGET_PREFIX)
}

/// initiate the global tracing subscriber
///
/// The returned guard flushes the metrics file on drop and must be held for
/// the lifetime of the process.
pub fn init<P: AsRef<Path>>(metrics_file: Option<P>) -> anyhow::Result<Option<WorkerGuard>> {
    let fmt_layer = utils::logging::get_fmt_layer().with_filter(
        utils::logging::default_env_filter()
            .and(filter::filter_fn(|metadata| !is_metrics_target(metadata.target()))),
    );

    let Some(metrics_file) = metrics_file else {
        registry().with(fmt_layer).init();
        return Ok(None);
    };

    let metrics_file = metrics_file.as_ref();
    let directory = metrics_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let file_name = metrics_file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid metrics file name: {}", metrics_file.display()))?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name)
        .max_log_files(3)
        .build(directory)
        .context("failed to create rolling file appender")?;

    let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

    let metrics_layer = layer()
        .event_format(InfluxDBFormatter {})
        .fmt_fields(format::DefaultFields::new())
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(filter::filter_fn(|metadata| {
            is_metrics_target(metadata.target())
        }));

    registry().with(fmt_layer).with(metrics_layer).init();
    Ok(Some(file_guard))
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    fn parse(line: &str) -> influxdb_line_protocol::ParsedLine<'_> {
        let mut lines = influxdb_line_protocol::parse_lines(line);
        let parsed = lines.next().expect("one line").expect("valid line protocol");
        assert!(lines.next().is_none());
        parsed
    }

    #[test]
    fn encodes_influx_line_with_sorted_tags_and_typed_fields() {
        let tags = BTreeMap::from([
            ("node".to_string(), "rig a".to_string()),
            ("direction".to_string(), "up".to_string()),
        ]);
        let fields = BTreeMap::from([
            ("used".to_string(), FieldValue::UnsignedInteger(8)),
            ("available".to_string(), FieldValue::Integer(-2)),
        ]);

        let line = encode_line("gpu_capacity", &tags, &fields, 42).expect("line");

        assert_eq!(
            line,
            "gpu_capacity,direction=up,node=rig\\ a available=-2i,used=8u 42\n"
        );
    }

    #[test]
    fn unsigned_fields_above_i64_range_stay_parseable() {
        let fields = BTreeMap::from([(
            "requested".to_string(),
            FieldValue::UnsignedInteger(u64::MAX),
        )]);

        let line = encode_line("gpu_capacity", &BTreeMap::new(), &fields, 1).expect("line");
        let parsed = parse(&line);

        assert!(matches!(
            parsed.field_value("requested"),
            Some(influxdb_line_protocol::FieldValue::U64(u64::MAX))
        ));
    }

    #[test]
    fn special_characters_survive_encoding() {
        let mut visitor = FieldVisitor::default();
        visitor
            .tags
            .insert("node".to_string(), "rig,one=a b".to_string());
        visitor.fields.insert(
            "note".to_string(),
            FieldValue::String("say \"hi\"".to_string()),
        );

        let line =
            encode_line("gpu_actuation", &visitor.tags, &visitor.fields, 7).expect("line");
        let parsed = parse(&line);

        assert_eq!(
            parsed.tag_value("node").map(|v| v.to_string()),
            Some("rig,one=a b".to_string())
        );
        match parsed.field_value("note") {
            Some(influxdb_line_protocol::FieldValue::String(note)) => {
                assert_eq!(note.to_string(), "say \"hi\"")
            }
            other => panic!("unexpected field value {other:?}"),
        }
    }

    #[test]
    fn trailing_backslash_is_dropped_from_tags() {
        let mut visitor = FieldVisitor::default();
        visitor.insert_tag("node", "rig\\");
        visitor
            .fields
            .insert("status".to_string(), FieldValue::UnsignedInteger(200));

        let line =
            encode_line("gpu_actuation", &visitor.tags, &visitor.fields, 7).expect("line");
        let parsed = parse(&line);

        assert_eq!(
            parsed.tag_value("node").map(|v| v.to_string()),
            Some("rig".to_string())
        );
    }

    #[test]
    fn event_without_fields_encodes_nothing() {
        assert!(encode_line("gpu_capacity", &BTreeMap::new(), &BTreeMap::new(), 1).is_none());
    }

    #[test]
    fn only_prefixed_targets_are_metrics() {
        assert!(is_metrics_target("metrics.gpu_capacity"));
        assert!(!is_metrics_target("gpu_autoscaler::app::control_loop"));
        assert!(!is_metrics_target("metrics_helper"));
    }
}
