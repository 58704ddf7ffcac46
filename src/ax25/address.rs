//! AX.25 address field encoding: one 7-byte group per callsign, the
//! trailing `SSID` byte carrying the `H RR SSID LAST` bitfield described in
//! spec.md §3. Each callsign character byte has its low bit clear (that
//! bit is reserved for the address-field-extension marker carried in the
//! SSID byte of the final address), and the last address in the field has
//! its SSID byte's low bit set.

use crate::error::Ax25Error;

/// One decoded AX.25 address: a callsign, SSID, and the two flag bits that
/// ride in the same byte (`h` — command/response or "has been repeated";
/// `last` — address-field-extension, set only on the final address).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub callsign: String,
    pub ssid: u8,
    pub h_bit: bool,
    pub last: bool,
}

impl Address {
    pub fn new(callsign: &str, ssid: u8) -> Self {
        Address {
            callsign: callsign.to_string(),
            ssid,
            h_bit: false,
            last: false,
        }
    }

    /// Encode as the 7-byte on-air representation.
    pub fn encode(&self, strict: bool) -> Result<[u8; 7], Ax25Error> {
        if self.callsign.len() > 6 {
            return Err(Ax25Error::CallsignTooLong(self.callsign.clone()));
        }
        if strict && self.callsign.chars().any(|c| c.is_ascii_lowercase()) {
            return Err(Ax25Error::LowerCaseCallsign(self.callsign.clone()));
        }
        if self.ssid > 15 {
            return Err(Ax25Error::BadSsid(self.ssid));
        }
        let mut out = [0u8; 7];
        let padded: Vec<u8> = self
            .callsign
            .to_ascii_uppercase()
            .bytes()
            .chain(std::iter::repeat(b' '))
            .take(6)
            .collect();
        for (i, b) in padded.into_iter().enumerate() {
            out[i] = b << 1;
        }
        let mut ssid_byte = 0x60; // reserved RR bits conventionally set to 11
        ssid_byte |= (self.ssid & 0x0F) << 1;
        if self.h_bit {
            ssid_byte |= 0x80;
        }
        if self.last {
            ssid_byte |= 0x01;
        }
        out[6] = ssid_byte;
        Ok(out)
    }

    /// Decode from a 7-byte on-air group.
    pub fn decode(bytes: &[u8; 7]) -> Result<Self, Ax25Error> {
        let mut callsign = String::new();
        for &b in &bytes[..6] {
            if b & 1 != 0 {
                return Err(Ax25Error::BadAddressTermination);
            }
            let c = (b >> 1) as char;
            callsign.push(c);
        }
        let callsign = callsign.trim_end().to_string();
        let ssid_byte = bytes[6];
        Ok(Address {
            callsign,
            ssid: (ssid_byte >> 1) & 0x0F,
            h_bit: ssid_byte & 0x80 != 0,
            last: ssid_byte & 0x01 != 0,
        })
    }

    /// Formatted as `CALL-SSID` (SSID-0 suppressed) with a trailing `*`
    /// when `h_bit` is set and `with_star` is requested (digipeater
    /// has-been-repeated marker; meaningless on source/destination).
    pub fn to_text(&self, with_star: bool) -> String {
        let mut s = self.callsign.clone();
        if self.ssid != 0 {
            s.push('-');
            s.push_str(&self.ssid.to_string());
        }
        if with_star && self.h_bit {
            s.push('*');
        }
        s
    }
}

/// Encode a full address field (source, destination, up to 8 digipeaters).
/// `addrs[0]` is the destination, `addrs[1]` the source, the rest
/// digipeaters, matching on-air order (spec.md §4.6 text form is
/// `SRC>DEST,DIGI…`, the reverse of on-air order).
pub fn encode_field(addrs: &[Address], strict: bool) -> Result<Vec<u8>, Ax25Error> {
    if addrs.len() < 2 || addrs.len() > 10 {
        return Err(Ax25Error::BadAddressCount(addrs.len()));
    }
    let mut out = Vec::with_capacity(addrs.len() * 7);
    let last_idx = addrs.len() - 1;
    for (i, a) in addrs.iter().enumerate() {
        let mut a = a.clone();
        a.last = i == last_idx;
        out.extend_from_slice(&a.encode(strict)?);
    }
    Ok(out)
}

/// Decode an address field, returning the addresses and the byte length
/// consumed.
pub fn decode_field(bytes: &[u8]) -> Result<(Vec<Address>, usize), Ax25Error> {
    let mut out = Vec::new();
    let mut i = 0;
    loop {
        if i + 7 > bytes.len() {
            return Err(Ax25Error::MisalignedAddressField);
        }
        let mut group = [0u8; 7];
        group.copy_from_slice(&bytes[i..i + 7]);
        let addr = Address::decode(&group)?;
        let last = addr.last;
        out.push(addr);
        i += 7;
        if last {
            break;
        }
        if out.len() > 10 {
            return Err(Ax25Error::BadAddressCount(out.len()));
        }
    }
    if out.len() < 2 || out.len() > 10 {
        return Err(Ax25Error::BadAddressCount(out.len()));
    }
    Ok((out, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_two_addresses() {
        let dest = Address::new("TEST", 0);
        let src = Address::new("WB2OSZ", 15);
        let field = encode_field(&[dest.clone(), src.clone()], true).unwrap();
        assert_eq!(field.len(), 14);
        let (decoded, len) = decode_field(&field).unwrap();
        assert_eq!(len, 14);
        assert_eq!(decoded[0].callsign, "TEST");
        assert_eq!(decoded[1].callsign, "WB2OSZ");
        assert_eq!(decoded[1].ssid, 15);
        assert!(decoded[1].last);
        assert!(!decoded[0].last);
    }

    #[test]
    fn rejects_long_callsign() {
        let a = Address::new("TOOLONGCALL", 0);
        assert!(a.encode(true).is_err());
    }

    #[test]
    fn rejects_lowercase_in_strict() {
        let a = Address::new("n0call", 0);
        assert!(a.encode(true).is_err());
        assert!(a.encode(false).is_ok());
    }
}
