//! Optional inverse-text-normalization stage.
//!
//! Rewrites spoken-domain digits into written Thai: clock times, currency
//! amounts, and bare number runs. Non-Thai segments only get whitespace
//! normalization.

use crate::context::JobContext;
use crate::job::JobOptions;
use crate::stage::{Stage, StageError};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

const THAI_ONES: [&str; 10] = [
    "ศูนย์", "หนึ่ง", "สอง", "สาม", "สี่", "ห้า", "หก", "เจ็ด", "แปด", "เก้า",
];

const THAI_TENS: [&str; 10] = [
    "", "สิบ", "ยี่สิบ", "สามสิบ", "สี่สิบ", "ห้าสิบ", "หกสิบ", "เจ็ดสิบ", "แปดสิบ", "เก้าสิบ",
];

// Patterns are literals; failing to compile is a programmer error.
#[allow(clippy::expect_used)]
fn static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static regex")
}

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| static_regex(r"\s+"));
static CURRENCY: LazyLock<Regex> = LazyLock::new(|| static_regex(r"(\d+[.,]?\d*)\s?(บาท|฿)"));
static CLOCK_TIME: LazyLock<Regex> = LazyLock::new(|| static_regex(r"(\d{1,2})[:.](\d{2})"));
static DIGIT_RUN: LazyLock<Regex> = LazyLock::new(|| static_regex(r"\d+"));

fn two_digit(number: u32) -> String {
    match number {
        0..=9 => THAI_ONES[number as usize].to_string(),
        10 => "สิบ".to_string(),
        11 => "สิบเอ็ด".to_string(),
        12..=19 => format!("สิบ{}", THAI_ONES[(number - 10) as usize]),
        _ => {
            let tens = (number / 10) as usize;
            let ones = (number % 10) as usize;
            if ones == 0 {
                THAI_TENS[tens].to_string()
            } else if ones == 1 {
                format!("{}เอ็ด", THAI_TENS[tens])
            } else {
                format!("{}{}", THAI_TENS[tens], THAI_ONES[ones])
            }
        }
    }
}

/// Numbers up to 999 are spelled out; larger runs are kept as digits.
fn number_to_words(number: u32) -> String {
    if number < 100 {
        return two_digit(number);
    }
    if number < 1000 {
        let hundreds = (number / 100) as usize;
        let remainder = number % 100;
        let mut out = format!("{}ร้อย", THAI_ONES[hundreds]);
        if remainder > 0 {
            out.push_str(&two_digit(remainder));
        }
        return out;
    }
    number.to_string()
}

/// Applies Thai inverse text normalization to one text span.
pub fn inverse_text_normalize(text: &str, language: &str) -> String {
    let collapsed = WHITESPACE.replace_all(text.trim(), " ");
    if !language.starts_with("th") {
        return collapsed.into_owned();
    }

    let with_currency = CURRENCY.replace_all(&collapsed, |caps: &regex::Captures| {
        format!("{}บาท", &caps[1])
    });
    let with_time = CLOCK_TIME.replace_all(&with_currency, |caps: &regex::Captures| {
        let hours: u32 = caps[1].parse().unwrap_or(0);
        let minutes: u32 = caps[2].parse().unwrap_or(0);
        format!("{}โมง{}", number_to_words(hours), number_to_words(minutes))
    });
    let with_numbers = DIGIT_RUN.replace_all(&with_time, |caps: &regex::Captures| {
        match caps[0].parse::<u32>() {
            Ok(n) if n < 1000 => Cow::Owned(number_to_words(n)),
            _ => Cow::Owned(caps[0].to_string()),
        }
    });
    with_numbers.into_owned()
}

#[derive(Debug, Default)]
pub struct ItnStage;

impl ItnStage {
    pub fn new() -> Self {
        Self
    }
}

impl Stage for ItnStage {
    fn name(&self) -> &'static str {
        "itn"
    }

    fn is_optional(&self) -> bool {
        true
    }

    fn enabled(&self, options: &JobOptions) -> bool {
        options.enable_itn
    }

    fn process(&self, ctx: &mut JobContext) -> Result<(), StageError> {
        let default_language = ctx.language_or_default().to_string();
        for segment in &mut ctx.segments {
            let language = segment
                .language
                .as_deref()
                .unwrap_or(&default_language)
                .to_string();
            segment.text = inverse_text_normalize(&segment.text, &language);
        }
        Ok(())
    }
}
