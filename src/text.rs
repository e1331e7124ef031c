use tracing::debug;

/// UTF-8 when valid, otherwise ISO-8859-1 byte-to-char mapping.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            debug!("input is not UTF-8, decoding as Latin-1");
            e.into_bytes().into_iter().map(char::from).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_input_is_decoded() {
        assert_eq!(decode_text(b"Caf\xe9 Park".to_vec()), "Café Park");
        assert_eq!(decode_text("Café".as_bytes().to_vec()), "Café");
    }
}
