//! Regex parser for the headline facts of a lease.
//!
//! Each field has an ordered list of patterns; the first match wins. The
//! analysis models usually return better values, which then override these.

use crate::models::LeaseInfo;
use once_cell::sync::Lazy;
use regex::Regex;

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid lease regex"))
        .collect()
}

static ADDRESS: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:property|premises|located at|address)[:\s]+([^\n]+?(?:street|st|avenue|ave|road|rd|drive|dr|blvd|boulevard|lane|ln|way|court|ct)\.?[,\s]+[A-Za-z\s]+[,\s]+[A-Z]{2})",
        r"(?i)(?:property|premises|located at|address)[:\s]+([^\n]+)",
        r"(?i)(\d+\s+[A-Za-z\s]+(?:street|st|avenue|ave|road|rd|drive|dr|blvd|boulevard|lane|ln|way|court|ct)[^\n]*)",
    ])
});

static CITY_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z\s]+),\s*([A-Z]{2})(?:\s+\d{5})?(?:\s|$|,)").expect("valid regex"));

static CITY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:city|town)[:\s]+([A-Za-z\s]+?)(?:,|\s+[A-Z]{2}|\n)",
        r"(?i)(?:in the (?:city|town) of)\s+([A-Za-z\s]+?)(?:,|\s+[A-Z]{2}|\n)",
    ])
});

// Case-sensitive: state codes are upper case.
static STATE: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"\b([A-Z]{2})\s+\d{5}(?:-\d{4})?\b",
        r"(?:state of)\s+([A-Z]{2})\b",
        r"(?:,\s*)([A-Z]{2})(?:\s|,|$)",
    ])
});

static COUNTY: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:county of)\s+([A-Za-z\s]+?)(?:\s+county|,|\n|state)",
        r"(?i)([A-Za-z\s]+)\s+county(?:,|\s|$)",
        r"(?i)(?:in)\s+([A-Za-z\s]+)\s+county",
    ])
});

static COUNTY_FILLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(the|of|in)\b").expect("valid regex"));

static RENT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:monthly\s+rent|rent\s+amount)[:\s]+\$?([\d,]+(?:\.\d{2})?)",
        r"(?i)(?:tenant\s+shall\s+pay|agrees\s+to\s+pay)[^$]*\$?([\d,]+(?:\.\d{2})?)\s*(?:per\s+month|monthly)",
    ])
});

static DEPOSIT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:security\s+deposit)[:\s]+\$?([\d,]+(?:\.\d{2})?)",
        r"(?i)(?:deposit\s+of)[:\s]+\$?([\d,]+(?:\.\d{2})?)",
    ])
});

static LANDLORD: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:landlord|lessor|owner)[:\s]+([A-Za-z\s.]+)(?:\n|,|hereinafter)",
        r"(?i)between\s+([A-Za-z\s.]+)\s+(?:as\s+)?(?:landlord|lessor)",
    ])
});

static TENANT: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:tenant|lessee|renter)[:\s]+([A-Za-z\s.]+)(?:\n|,|hereinafter)",
        r"(?i)and\s+([A-Za-z\s.]+)\s+(?:as\s+)?(?:tenant|lessee)",
    ])
});

static DURATION: Lazy<Vec<Regex>> = Lazy::new(|| {
    compile(&[
        r"(?i)(?:term|duration|period)[:\s]+(\d+\s+(?:month|year)s?)",
        r"(?i)(?:lease\s+term)[:\s]+([^\n]+)",
    ])
});

/// First capture of the first matching pattern, trimmed.
fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    patterns
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn parse_county(text: &str) -> Option<String> {
    COUNTY.iter().find_map(|re| {
        let raw = re.captures(text)?.get(1)?.as_str();
        let cleaned = COUNTY_FILLER.replace_all(raw, "");
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        let letters_only = cleaned.chars().all(|c| c.is_alphabetic() || c == ' ');
        (cleaned.len() > 2 && letters_only).then_some(cleaned)
    })
}

/// Parse headline facts out of `text`; `full_text` is set to `text`.
pub fn parse_lease_info(text: &str) -> LeaseInfo {
    let mut info = LeaseInfo {
        full_text: text.to_string(),
        ..LeaseInfo::default()
    };

    info.address = first_capture(&ADDRESS, text);
    if let Some(caps) = info.address.as_deref().and_then(|a| CITY_STATE.captures(a)) {
        info.city = caps.get(1).map(|m| m.as_str().trim().to_string());
        info.state = caps.get(2).map(|m| m.as_str().to_string());
    }
    if info.city.is_none() {
        info.city = first_capture(&CITY, text);
    }
    if info.state.is_none() {
        info.state = first_capture(&STATE, text);
    }
    info.county = parse_county(text);

    info.rent_amount = first_capture(&RENT, text).map(|v| format!("${v}"));
    info.security_deposit = first_capture(&DEPOSIT, text).map(|v| format!("${v}"));
    info.landlord = first_capture(&LANDLORD, text);
    info.tenant = first_capture(&TENANT, text);
    info.lease_duration = first_capture(&DURATION, text);
    info
}
