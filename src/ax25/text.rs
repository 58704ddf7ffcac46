//! TNC-2 monitor text form: `SRC[-ssid]>DEST[-ssid][,DIGI[-ssid][*]]…:INFO`.
//!
//! A trailing `*` on a digipeater address marks its H-bit (has been
//! repeated). `<0xNN>` inside the info field is a hex escape for the
//! literal byte `NN`, used to represent non-printable bytes in an
//! otherwise-text monitor line.

use super::address::Address;
use crate::error::Ax25Error;

/// One address as it appeared in TNC-2 text, before on-air encoding. Kept
/// distinct from [`Address`] so that loose-mode q-construct entries
/// (`qAC`, `qAR`, …, which are APRS-IS artifacts, never sent on air) and
/// 2-character alphanumeric SSIDs round-trip exactly through text even
/// though they have no on-air representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextAddress {
    pub callsign: String,
    pub ssid_text: Option<String>,
    pub star: bool,
}

impl TextAddress {
    fn ssid_numeric(&self) -> Option<u8> {
        self.ssid_text.as_ref().and_then(|s| s.parse::<u8>().ok())
    }

    /// Convert to an on-air [`Address`]; fails if the SSID text is not a
    /// plain 0..=15 decimal number (q-constructs have no on-air form).
    pub fn to_address(&self) -> Result<Address, Ax25Error> {
        let ssid = match &self.ssid_text {
            None => 0,
            Some(_) => self
                .ssid_numeric()
                .ok_or_else(|| Ax25Error::BadText(format!("non-numeric SSID {:?}", self.ssid_text)))?,
        };
        if ssid > 15 {
            return Err(Ax25Error::BadSsid(ssid));
        }
        let mut a = Address::new(&self.callsign, ssid);
        a.h_bit = self.star;
        Ok(a)
    }

    pub fn from_address(a: &Address, with_star: bool) -> Self {
        TextAddress {
            callsign: a.callsign.clone(),
            ssid_text: if a.ssid == 0 { None } else { Some(a.ssid.to_string()) },
            star: with_star && a.h_bit,
        }
    }
}

/// A parsed TNC-2 monitor line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFrame {
    pub source: TextAddress,
    pub dest: TextAddress,
    pub digis: Vec<TextAddress>,
    pub info: Vec<u8>,
}

fn is_q_construct(callsign: &str, loose: bool) -> bool {
    loose && callsign.len() == 3 && callsign.starts_with('q')
}

fn parse_one_address(tok: &str, strict: bool, allow_star: bool) -> Result<TextAddress, Ax25Error> {
    let (body, star) = if let Some(stripped) = tok.strip_suffix('*') {
        if !allow_star && strict {
            return Err(Ax25Error::MisplacedHBitMark);
        }
        (stripped, true)
    } else {
        (tok, false)
    };
    let (callsign, ssid_text) = match body.split_once('-') {
        Some((c, s)) => (c, Some(s.to_string())),
        None => (body, None),
    };
    if callsign.is_empty() {
        return Err(Ax25Error::BadText(tok.to_string()));
    }
    if strict {
        if callsign.len() > 6 {
            return Err(Ax25Error::CallsignTooLong(callsign.to_string()));
        }
        if callsign.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(Ax25Error::LowerCaseCallsign(callsign.to_string()));
        }
        if let Some(s) = &ssid_text {
            let n: u8 = s
                .parse()
                .map_err(|_| Ax25Error::BadText(format!("non-numeric SSID {s:?} in strict mode")))?;
            if n > 15 {
                return Err(Ax25Error::BadSsid(n));
            }
        }
    } else if !is_q_construct(callsign, true) {
        if let Some(s) = &ssid_text {
            if s.len() > 2 || !s.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err(Ax25Error::BadText(format!("malformed SSID {s:?}")));
            }
        }
    }
    Ok(TextAddress {
        callsign: callsign.to_string(),
        ssid_text,
        star,
    })
}

fn unescape_info(s: &str) -> Result<Vec<u8>, Ax25Error> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'<' {
            // Look for "<0xNN>".
            if let Some(end) = s[i..].find('>') {
                let tag = &s[i + 1..i + end];
                if let Some(hex) = tag.strip_prefix("0x").or_else(|| tag.strip_prefix("0X")) {
                    if hex.len() == 2 {
                        if let Ok(v) = u8::from_str_radix(hex, 16) {
                            out.push(v);
                            i += end + 1;
                            continue;
                        }
                    }
                }
                return Err(Ax25Error::BadHexEscape(tag.to_string()));
            }
            return Err(Ax25Error::BadHexEscape(s[i..].to_string()));
        }
        out.push(bytes[i]);
        i += 1;
    }
    Ok(out)
}

fn escape_info(info: &[u8]) -> String {
    let mut out = String::with_capacity(info.len());
    for &b in info {
        if (0x20..0x7F).contains(&b) && b != b'<' {
            out.push(b as char);
        } else {
            out.push_str(&format!("<0x{b:02X}>"));
        }
    }
    out
}

/// Parse a TNC-2 text line.
pub fn parse(s: &str, strict: bool) -> Result<TextFrame, Ax25Error> {
    let (header, info_part) = s.split_once(':').ok_or_else(|| Ax25Error::BadText(s.to_string()))?;
    let (src_tok, rest) = header.split_once('>').ok_or_else(|| Ax25Error::BadText(s.to_string()))?;
    let mut path: Vec<&str> = rest.split(',').collect();
    if path.is_empty() {
        return Err(Ax25Error::BadText(s.to_string()));
    }
    let dest_tok = path.remove(0);

    let source = parse_one_address(src_tok, strict, false)?;
    let dest = parse_one_address(dest_tok, strict, false)?;
    let digis = path
        .iter()
        .map(|tok| parse_one_address(tok, strict, true))
        .collect::<Result<Vec<_>, _>>()?;
    let info = unescape_info(info_part)?;
    Ok(TextFrame { source, dest, digis, info })
}

/// Format back to TNC-2 text. SSID-0 is suppressed; a digipeater's H-bit
/// is rendered only on that one digipeater's entry.
pub fn format(frame: &TextFrame) -> String {
    let mut s = String::new();
    s.push_str(&addr_text(&frame.source));
    s.push('>');
    s.push_str(&addr_text(&frame.dest));
    for d in &frame.digis {
        s.push(',');
        s.push_str(&addr_text(d));
    }
    s.push(':');
    s.push_str(&escape_info(&frame.info));
    s
}

fn addr_text(a: &TextAddress) -> String {
    let mut s = a.callsign.clone();
    if let Some(ssid) = &a.ssid_text {
        s.push('-');
        s.push_str(ssid);
    }
    if a.star {
        s.push('*');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_simple() {
        let s = "WB2OSZ-15>TEST:Hello";
        let frame = parse(s, true).unwrap();
        assert_eq!(format(&frame), s);
    }

    #[test]
    fn roundtrip_with_digis_and_star() {
        let s = "N0CALL>APRS,WIDE1-1*,WIDE2-2:payload";
        let frame = parse(s, true).unwrap();
        assert_eq!(format(&frame), s);
        assert!(frame.digis[0].star);
        assert!(!frame.digis[1].star);
    }

    #[test]
    fn hex_escape_roundtrip() {
        let s = "A>B:abc<0x00>def";
        let frame = parse(s, true).unwrap();
        assert_eq!(frame.info, b"abc\x00def");
        assert_eq!(format(&frame), s);
    }

    #[test]
    fn ssid0_suppressed_on_input_without_ssid() {
        let frame = parse("A>B:x", true).unwrap();
        assert_eq!(frame.source.ssid_text, None);
    }

    #[test]
    fn strict_rejects_long_callsign() {
        assert!(parse("TOOLONGCALLSIGN>B:x", true).is_err());
    }

    #[test]
    fn loose_allows_q_construct() {
        let frame = parse("N0CALL>APRS,qAC,FOURTH*:x", false).unwrap();
        assert_eq!(frame.digis[0].callsign, "qAC");
    }
}
