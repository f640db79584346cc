//! Region code normalization.

use keyfed_types::FetchRequest;

/// Uppercases every inclusion and exclusion region on the request in place.
///
/// No validation is performed: a code that no stored record carries simply
/// never matches.
pub fn normalize_regions(req: &mut FetchRequest) {
    for region in req
        .region_identifiers
        .iter_mut()
        .chain(req.exclude_region_identifiers.iter_mut())
    {
        *region = region.to_uppercase();
    }
}
