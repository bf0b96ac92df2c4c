use std::collections::HashSet;

use prost::Message;

use sluice_proto::v0::{summary_value, Summary, SummaryValue};

use crate::histogram::Histogram;
use crate::SummaryError;

/// One labeled scalar entry per input element; no aggregation.
pub fn scalar_summary<V>(tags: &[String], values: &[V]) -> Result<Summary, SummaryError>
where
    V: Copy + Into<f64>,
{
    if tags.len() != values.len() {
        return Err(SummaryError::TagCountMismatch {
            tags: tags.len(),
            values: values.len(),
        });
    }

    let value = tags
        .iter()
        .zip(values)
        .map(|(tag, &v)| SummaryValue {
            tag: tag.clone(),
            payload: Some(summary_value::Payload::SimpleValue(v.into() as f32)),
        })
        .collect();
    Ok(Summary { value })
}

/// Aggregates `values` into one tagged histogram entry.
///
/// This is the enforcing caller for the aggregator's finiteness contract:
/// NaN and infinite samples are rejected here, before any `add`.
pub fn histogram_summary<V>(tag: &str, values: &[V]) -> Result<Summary, SummaryError>
where
    V: Copy + Into<f64>,
{
    let mut histogram = Histogram::new();
    for (index, &v) in values.iter().enumerate() {
        let value: f64 = v.into();
        if !value.is_finite() {
            return Err(SummaryError::NonFiniteSample { index, value });
        }
        histogram.add(value);
    }

    Ok(Summary {
        value: vec![SummaryValue {
            tag: tag.to_string(),
            payload: Some(summary_value::Payload::Histo(histogram.to_record())),
        }],
    })
}

/// One tagged free-text entry.
pub fn text_summary(tag: &str, text: &str) -> Summary {
    Summary {
        value: vec![SummaryValue {
            tag: tag.to_string(),
            payload: Some(summary_value::Payload::Text(text.to_string())),
        }],
    }
}

/// Concatenates previously serialized summaries into one record.
///
/// Entry order is preserved: inputs in the order given, entries within an
/// input in that input's order. A non-empty tag appearing twice across the
/// inputs is an error; untagged entries may repeat.
pub fn merge_summaries<B>(inputs: &[B]) -> Result<Summary, SummaryError>
where
    B: AsRef<[u8]>,
{
    let mut merged = Summary::default();
    let mut seen_tags: HashSet<String> = HashSet::new();

    for input in inputs {
        let parsed = Summary::decode(input.as_ref())?;
        for entry in parsed.value {
            if !entry.tag.is_empty() && !seen_tags.insert(entry.tag.clone()) {
                return Err(SummaryError::DuplicateTag { tag: entry.tag });
            }
            merged.value.push(entry);
        }
    }

    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn scalar_summary_pairs_tags_with_values() {
        let summary = scalar_summary(&tags(&["loss", "lr"]), &[0.5f32, 0.001]).unwrap();
        assert_eq!(summary.value.len(), 2);
        assert_eq!(summary.value[0].tag, "loss");
        assert_eq!(
            summary.value[0].payload,
            Some(summary_value::Payload::SimpleValue(0.5))
        );
        assert_eq!(summary.value[1].tag, "lr");
    }

    #[test]
    fn scalar_summary_rejects_length_mismatch() {
        let err = scalar_summary(&tags(&["a"]), &[1.0f64, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            SummaryError::TagCountMismatch { tags: 1, values: 2 }
        ));
    }

    #[test]
    fn histogram_summary_rejects_non_finite_input() {
        let err = histogram_summary("weights", &[1.0f64, f64::NAN]).unwrap_err();
        assert!(matches!(err, SummaryError::NonFiniteSample { index: 1, .. }));

        let err = histogram_summary("weights", &[f64::INFINITY]).unwrap_err();
        assert!(matches!(err, SummaryError::NonFiniteSample { index: 0, .. }));
    }

    #[test]
    fn histogram_summary_emits_one_tagged_entry() {
        let summary = histogram_summary("weights", &[0.25f32, -0.25, 0.0]).unwrap();
        assert_eq!(summary.value.len(), 1);
        assert_eq!(summary.value[0].tag, "weights");
        let Some(summary_value::Payload::Histo(record)) = &summary.value[0].payload else {
            panic!("expected a histogram payload");
        };
        assert_eq!(record.num, 3.0);
    }

    #[test]
    fn merge_rejects_duplicate_tags() {
        let a = scalar_summary(&tags(&["a"]), &[1.0f32]).unwrap().encode_to_vec();
        let b = scalar_summary(&tags(&["a"]), &[2.0f32]).unwrap().encode_to_vec();

        let err = merge_summaries(&[a, b]).unwrap_err();
        match err {
            SummaryError::DuplicateTag { tag } => assert_eq!(tag, "a"),
            other => panic!("expected DuplicateTag, got {other:?}"),
        }
    }

    #[test]
    fn merge_preserves_input_order() {
        let a = scalar_summary(&tags(&["a"]), &[1.0f32]).unwrap().encode_to_vec();
        let b = scalar_summary(&tags(&["b"]), &[2.0f32]).unwrap().encode_to_vec();

        let merged = merge_summaries(&[a, b]).unwrap();
        let got: Vec<&str> = merged.value.iter().map(|v| v.tag.as_str()).collect();
        assert_eq!(got, vec!["a", "b"]);
    }

    #[test]
    fn merge_allows_repeated_empty_tags() {
        let a = scalar_summary(&tags(&[""]), &[1.0f32]).unwrap().encode_to_vec();
        let b = scalar_summary(&tags(&[""]), &[2.0f32]).unwrap().encode_to_vec();

        let merged = merge_summaries(&[a, b]).unwrap();
        assert_eq!(merged.value.len(), 2);
    }

    #[test]
    fn merge_rejects_malformed_input() {
        let good = scalar_summary(&tags(&["a"]), &[1.0f32]).unwrap().encode_to_vec();
        let garbage: Vec<u8> = vec![0xff, 0xff, 0xff, 0xff];

        let err = merge_summaries(&[good, garbage]).unwrap_err();
        assert!(matches!(err, SummaryError::MalformedSummary(_)));
    }

    #[test]
    fn merge_of_nothing_is_empty() {
        let merged = merge_summaries::<Vec<u8>>(&[]).unwrap();
        assert!(merged.value.is_empty());
    }
}
