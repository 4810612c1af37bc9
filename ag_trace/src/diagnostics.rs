//! Section-control diagnosis: flag counts plus an ordered rule table that
//! names the first broken link in the activation chain.

use std::fmt::Write as _;

use serde_json::Value as JsonValue;

use crate::{PathSample, TraceError};

/// Classification is a function of these counts alone; two recordings with
/// equal counts always classify identically.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlagCounts {
    pub total: usize,
    pub job_started: usize,
    pub section_on: usize,
    pub section_mapping: usize,
    pub section_on_request: usize,
    pub patches_recorded: usize,
}

impl FlagCounts {
    pub fn percent(&self, count: usize) -> f64 {
        100.0 * count as f64 / self.total as f64
    }

    pub fn summary_rows(&self) -> [(&'static str, usize); 5] {
        [
            ("jobStarted=true", self.job_started),
            ("sec0_on=true", self.section_on),
            ("sec0_mapping=true", self.section_mapping),
            ("sec0_onReq=true", self.section_on_request),
            ("patchCounter>0", self.patches_recorded),
        ]
    }
}

/// Empty recordings are rejected (the percentages would divide by zero); a
/// sample missing a diagnostic field aborts with that field's name.
pub fn count_flags(samples: &[PathSample]) -> Result<FlagCounts, TraceError> {
    if samples.is_empty() {
        return Err(TraceError::EmptyPath);
    }
    let mut counts = FlagCounts {
        total: samples.len(),
        ..FlagCounts::default()
    };
    for sample in samples {
        let field = |value: Option<bool>, name: &'static str| {
            value.ok_or(TraceError::MissingField(name))
        };
        if field(sample.job_started, "jobStarted")? {
            counts.job_started += 1;
        }
        if field(sample.sec_on, "sec0_on")? {
            counts.section_on += 1;
        }
        if field(sample.sec_mapping, "sec0_mapping")? {
            counts.section_mapping += 1;
        }
        if field(sample.sec_on_req, "sec0_onReq")? {
            counts.section_on_request += 1;
        }
        let patches = sample
            .patch_counter
            .ok_or(TraceError::MissingField("patchCounter"))?;
        if patches > 0.0 {
            counts.patches_recorded += 1;
        }
    }
    Ok(counts)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RootCause {
    JobNotStarted,
    MappingNeverRequested,
    MappingDelayedOrStuck,
    MappingOnButNoPatches,
    Nominal,
}

impl RootCause {
    pub fn label(self) -> &'static str {
        match self {
            RootCause::JobNotStarted => "JOB_NOT_STARTED",
            RootCause::MappingNeverRequested => "MAPPING_NEVER_REQUESTED",
            RootCause::MappingDelayedOrStuck => "MAPPING_DELAYED_OR_STUCK",
            RootCause::MappingOnButNoPatches => "MAPPING_ON_BUT_NO_PATCHES",
            RootCause::Nominal => "NOMINAL",
        }
    }

    pub fn explanation(self) -> &'static str {
        match self {
            RootCause::JobNotStarted => {
                "No sample has jobStarted=true. Section activation cannot occur \
                 until a job is started; start one before enabling sections."
            }
            RootCause::MappingNeverRequested => {
                "Section mapping never turned on, and no sample ever requested it \
                 (sec0_onReq=false throughout). The auto-section logic decided the \
                 section should stay off. Candidate upstream causes, not \
                 distinguishable from this recording:\n\
                 \x20 - section button state not set to on/auto\n\
                 \x20 - ground speed below the slow-speed cutoff\n\
                 \x20 - coverage under the implement already mapped\n\
                 \x20 - lookahead not seeing unworked ground"
            }
            RootCause::MappingDelayedOrStuck => {
                "On-requests were raised (sec0_onReq=true for some samples) but \
                 mapping never engaged. Mapping is expected to follow a request \
                 after a bounded delay; that delay did not resolve within this \
                 recording."
            }
            RootCause::MappingOnButNoPatches => {
                "Section mapping was on, but patchCounter stayed at zero: no \
                 coverage artifacts were produced while mapping was active."
            }
            RootCause::Nominal => {
                "No fault detected: the job was started, mapping engaged and \
                 coverage patches were recorded."
            }
        }
    }
}

/// Ordered rule table; the first predicate that holds names the root cause.
const RULES: [(fn(&FlagCounts) -> bool, RootCause); 5] = [
    (|c| c.job_started == 0, RootCause::JobNotStarted),
    (
        |c| c.section_mapping == 0 && c.section_on_request == 0,
        RootCause::MappingNeverRequested,
    ),
    (|c| c.section_mapping == 0, RootCause::MappingDelayedOrStuck),
    (|c| c.patches_recorded == 0, RootCause::MappingOnButNoPatches),
    (|_| true, RootCause::Nominal),
];

pub fn classify(counts: &FlagCounts) -> RootCause {
    RULES
        .iter()
        .find(|(predicate, _)| predicate(counts))
        .map(|(_, cause)| *cause)
        .expect("rule table ends with a catch-all")
}

const DIVIDER: &str =
    "================================================================================";

/// Sampled state dumps, then the count summary, then the classification block.
pub fn format_report(
    name: &str,
    samples: &[PathSample],
    counts: &FlagCounts,
    cause: RootCause,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{DIVIDER}");
    let _ = writeln!(out, "Section Control Analysis: {name}");
    let _ = writeln!(out, "{DIVIDER}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total path points: {}", samples.len());

    let len = samples.len();
    let mid = len / 2;
    dump_window(&mut out, "FIRST 5 POINTS:", samples, 0..len.min(5));
    if let Some(mid_sample) = samples.get(mid) {
        dump_window(
            &mut out,
            &format!("MIDDLE 3 POINTS (around {:.1}s):", mid_sample.t),
            samples,
            mid.saturating_sub(1)..(mid + 2).min(len),
        );
    }
    dump_window(&mut out, "LAST 3 POINTS:", samples, len.saturating_sub(3)..len);

    let _ = writeln!(out);
    let _ = writeln!(out, "SUMMARY:");
    for (label, count) in counts.summary_rows() {
        let _ = writeln!(
            out,
            "{label}: {count} / {} ({:.1}%)",
            counts.total,
            counts.percent(count)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "DIAGNOSTIC CONCLUSION:");
    let _ = writeln!(out, "{}", cause.label());
    let _ = writeln!(out, "{}", cause.explanation());
    out
}

fn dump_window(out: &mut String, title: &str, samples: &[PathSample], range: std::ops::Range<usize>) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{title}");
    for sample in &samples[range] {
        let _ = writeln!(
            out,
            "[{:5.1}s] N={:6.1}m, Speed={:4.1} km/h",
            sample.t, sample.n, sample.speed
        );
        let _ = writeln!(
            out,
            "  jobStarted={}, autoBtnState={}, patchCounter={}",
            opt_bool(sample.job_started),
            opt_scalar(&sample.auto_btn_state),
            opt_num(sample.patch_counter, 0)
        );
        let _ = writeln!(
            out,
            "  sec0_btnState={}, sec0_on={}, sec0_mapping={}, sec0_onReq={}, sec0_offReq={}",
            opt_scalar(&sample.sec_btn_state),
            opt_bool(sample.sec_on),
            opt_bool(sample.sec_mapping),
            opt_bool(sample.sec_on_req),
            opt_bool(sample.sec_off_req)
        );
        let _ = writeln!(
            out,
            "  avgSpeed={}, slowCutoff={}, sec0_speedPx={}",
            opt_num(sample.avg_speed, 2),
            opt_num(sample.slow_cutoff, 2),
            opt_num(sample.sec_speed_px, 2)
        );
    }
}

fn opt_bool(value: Option<bool>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

fn opt_num(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.decimals$}"))
}

// Button states are an enum whose JSON encoding varies across recorder
// versions (number or string); show either without quoting.
fn opt_scalar(value: &Option<JsonValue>) -> String {
    match value {
        None => "n/a".to_string(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
