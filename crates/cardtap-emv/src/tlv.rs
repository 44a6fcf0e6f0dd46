//! BER-TLV search over EMV data.
//!
//! Only what the decoder needs: walking data objects, descending into
//! constructed templates, and reading data object lists (PDOL).

/// One data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: &'a [u8],
    pub value: &'a [u8],
}

impl Tlv<'_> {
    /// Constructed objects contain nested data objects.
    pub fn is_constructed(&self) -> bool {
        self.tag.first().is_some_and(|b| b & 0x20 != 0)
    }
}

/// Iterator over the data objects at one nesting level.
///
/// Stops at the first malformed object. `00` and `FF` padding between
/// objects is skipped.
#[derive(Debug, Clone)]
pub struct TlvIter<'a> {
    data: &'a [u8],
}

/// Iterate the top-level data objects of `data`.
pub fn parse(data: &[u8]) -> TlvIter<'_> {
    TlvIter { data }
}

/// Read a tag at the start of `data`, returning its length in bytes.
fn tag_len(data: &[u8]) -> Option<usize> {
    let first = *data.first()?;
    if first & 0x1F != 0x1F {
        return Some(1);
    }
    // Subsequent tag bytes have bit 8 set, except the last.
    let rest = data[1..].iter().position(|b| b & 0x80 == 0)?;
    Some(rest + 2)
}

/// Read a length field at the start of `data`: (value length, field size).
fn value_len(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first & 0x80 == 0 {
        return Some((usize::from(first), 1));
    }

    let count = usize::from(first & 0x7F);
    if count == 0 || count > 3 {
        return None;
    }
    let bytes = data.get(1..=count)?;
    let len = bytes.iter().fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
    Some((len, count + 1))
}

impl<'a> Iterator for TlvIter<'a> {
    type Item = Tlv<'a>;

    fn next(&mut self) -> Option<Tlv<'a>> {
        let skip = self.data.iter().position(|b| *b != 0x00 && *b != 0xFF)?;
        let data = &self.data[skip..];

        let parsed = tag_len(data).and_then(|tag_len| {
            let (len, len_size) = value_len(&data[tag_len..])?;
            let start = tag_len + len_size;
            let value = data.get(start..start + len)?;
            Some((Tlv { tag: &data[..tag_len], value }, start + len))
        });

        match parsed {
            Some((tlv, consumed)) => {
                self.data = &data[consumed..];
                Some(tlv)
            }
            None => {
                self.data = &[];
                None
            }
        }
    }
}

/// Find the first object with `tag`, searching depth first through
/// constructed templates.
///
/// # Examples
///
/// ```
/// use cardtap_emv::tlv::find_tag;
///
/// // 70 { 5A 08 <PAN> }
/// let record = [0x70, 0x0A, 0x5A, 0x08, 0x41, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11];
/// assert_eq!(find_tag(&record, &[0x5A]).map(<[u8]>::len), Some(8));
/// assert_eq!(find_tag(&record, &[0x5F, 0x24]), None);
/// ```
pub fn find_tag<'a>(data: &'a [u8], tag: &[u8]) -> Option<&'a [u8]> {
    for tlv in parse(data) {
        if tlv.tag == tag {
            return Some(tlv.value);
        }
        if tlv.is_constructed()
            && let Some(value) = find_tag(tlv.value, tag)
        {
            return Some(value);
        }
    }
    None
}

/// Every object with `tag`, in document order, at any depth.
pub fn find_all<'a>(data: &'a [u8], tag: &[u8]) -> Vec<&'a [u8]> {
    let mut found = Vec::new();
    collect(data, tag, &mut found);
    found
}

fn collect<'a>(data: &'a [u8], tag: &[u8], found: &mut Vec<&'a [u8]>) {
    for tlv in parse(data) {
        if tlv.tag == tag {
            found.push(tlv.value);
        } else if tlv.is_constructed() {
            collect(tlv.value, tag, found);
        }
    }
}

/// Parse a data object list into (tag, expected length) pairs.
pub fn parse_dol(dol: &[u8]) -> Vec<(&[u8], usize)> {
    let mut entries = Vec::new();
    let mut rest = dol;

    while !rest.is_empty() {
        let Some(tag_len) = tag_len(rest) else { break };
        let Some(&len) = rest.get(tag_len) else { break };
        entries.push((&rest[..tag_len], usize::from(len)));
        rest = &rest[tag_len + 1..];
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flat_objects() {
        let data = [0x5A, 0x02, 0x12, 0x34, 0x9F, 0x38, 0x03, 0x9F, 0x66, 0x04];
        let objects: Vec<_> = parse(&data).collect();

        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].tag, &[0x5A]);
        assert_eq!(objects[0].value, &[0x12, 0x34]);
        assert_eq!(objects[1].tag, &[0x9F, 0x38]);
        assert!(!objects[1].is_constructed());
    }

    #[test]
    fn test_find_nested_tag() {
        // 6F { 84 .. A5 { 50 "VISA" } }
        let fci = [
            0x6F, 0x0D, 0x84, 0x03, 0xA0, 0x00, 0x00, 0xA5, 0x06, 0x50, 0x04, b'V', b'I', b'S',
            b'A',
        ];
        assert_eq!(find_tag(&fci, &[0x50]), Some(&b"VISA"[..]));
        assert_eq!(find_tag(&fci, &[0x84]), Some(&[0xA0, 0x00, 0x00][..]));
    }

    #[test]
    fn test_find_all_collects_every_match() {
        // BF0C { 61 { 4F a } 61 { 4F b } }
        let directory = [
            0xBF, 0x0C, 0x0A, 0x61, 0x03, 0x4F, 0x01, 0xAA, 0x61, 0x03, 0x4F, 0x01, 0xBB,
        ];
        assert_eq!(find_all(&directory, &[0x4F]), vec![&[0xAA][..], &[0xBB][..]]);
    }

    #[test]
    fn test_long_form_length() {
        // 70 { 5A (128 bytes) }, both lengths in 81 XX form.
        let mut data = vec![0x70, 0x81, 0x83, 0x5A, 0x81, 0x80];
        data.extend(std::iter::repeat_n(0x11, 0x80));
        assert_eq!(find_tag(&data, &[0x5A]).map(<[u8]>::len), Some(0x80));
    }

    #[test]
    fn test_padding_is_skipped() {
        let data = [0x00, 0x00, 0x5A, 0x01, 0x42, 0xFF, 0xFF];
        assert_eq!(find_tag(&data, &[0x5A]), Some(&[0x42][..]));
    }

    #[test]
    fn test_truncated_object_stops_parsing() {
        let data = [0x5A, 0x08, 0x41, 0x11];
        assert_eq!(parse(&data).count(), 0);
        assert_eq!(find_tag(&data, &[0x5A]), None);
    }

    #[test]
    fn test_parse_dol() {
        let pdol = [0x9F, 0x66, 0x04, 0x9F, 0x02, 0x06, 0x95, 0x05];
        let entries = parse_dol(&pdol);
        assert_eq!(
            entries,
            vec![(&[0x9F, 0x66][..], 4), (&[0x9F, 0x02][..], 6), (&[0x95][..], 5)]
        );
    }
}
