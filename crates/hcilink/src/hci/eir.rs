//! Extended Inquiry Response / advertising payload helpers
//!
//! Advertising payloads are a sequence of `[len][type][data...]` structures
//! where `len` covers the type byte and the data.

use crate::gap::{
    ADV_TYPE_COMPLETE_LOCAL_NAME, ADV_TYPE_MANUFACTURER_SPECIFIC, ADV_TYPE_SHORT_LOCAL_NAME,
};

/// Parse advertisement data into (type, data) tuples
///
/// Parsing stops at the first zero-length structure or at a structure that
/// runs past the end of `data`.
pub fn parse_advertising_data(data: &[u8]) -> Vec<(u8, &[u8])> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < data.len() {
        let length = data[i] as usize;
        if length == 0 || i + length >= data.len() {
            break;
        }

        let ad_type = data[i + 1];
        let ad_data = &data[i + 2..i + 1 + length];

        result.push((ad_type, ad_data));

        i += 1 + length;
    }

    result
}

/// The complete local name, falling back to the shortened one
pub fn local_name(data: &[u8]) -> Option<String> {
    let fields = parse_advertising_data(data);
    fields
        .iter()
        .find(|(ad_type, _)| *ad_type == ADV_TYPE_COMPLETE_LOCAL_NAME)
        .or_else(|| {
            fields
                .iter()
                .find(|(ad_type, _)| *ad_type == ADV_TYPE_SHORT_LOCAL_NAME)
        })
        .map(|(_, name)| String::from_utf8_lossy(name).into_owned())
}

/// Manufacturer specific data, company identifier included
pub fn manufacturer_data(data: &[u8]) -> Option<&[u8]> {
    parse_advertising_data(data)
        .into_iter()
        .find(|(ad_type, _)| *ad_type == ADV_TYPE_MANUFACTURER_SPECIFIC)
        .map(|(_, value)| value)
}
