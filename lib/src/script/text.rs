use std::io::Cursor;

use binrw::BinReaderExt;

use crate::error::ShuffleError;
use crate::script::var::VarRef;

/// One piece of an in-script message. Literal byte runs alternate with
/// control escapes; the interpreter substitutes the `Get*` tokens at
/// display time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextToken {
    Text(Vec<u8>),
    Newline,
    KeepText,
    Wait,
    GetInt(VarRef),
    GetVerb(VarRef),
    GetName(VarRef),
    GetString(VarRef),
    StartAnim(i16),
    SetColor(i16),
    SetFont(i16),
}

/// Reads a NUL-terminated token stream. Bytes 0xFF and 0xFE introduce an
/// escape; everything else accumulates into literal runs.
pub fn read_text_tokens(cur: &mut Cursor<&[u8]>) -> Result<Vec<TextToken>, ShuffleError> {
    let mut result = Vec::new();
    let mut text_buffer = Vec::new();
    loop {
        let test = read_u8(cur)?;
        if test == 0 {
            break;
        }
        if test == 0xFF || test == 0xFE {
            let code = read_u8(cur)?;
            if !text_buffer.is_empty() {
                result.push(TextToken::Text(std::mem::take(&mut text_buffer)));
            }
            match code {
                1 => result.push(TextToken::Newline),
                2 => result.push(TextToken::KeepText),
                3 => result.push(TextToken::Wait),
                4 => result.push(TextToken::GetInt(VarRef::read(cur)?)),
                5 => result.push(TextToken::GetVerb(VarRef::read(cur)?)),
                6 => result.push(TextToken::GetName(VarRef::read(cur)?)),
                7 => result.push(TextToken::GetString(VarRef::read(cur)?)),
                9 => result.push(TextToken::StartAnim(read_i16(cur)?)),
                12 => result.push(TextToken::SetColor(read_i16(cur)?)),
                14 => result.push(TextToken::SetFont(read_i16(cur)?)),
                other => {
                    return Err(ShuffleError::decode_at(
                        cur.position(),
                        format!("unknown text escape {other}"),
                    ))
                }
            }
        } else {
            text_buffer.push(test);
        }
    }
    if !text_buffer.is_empty() {
        result.push(TextToken::Text(text_buffer));
    }
    Ok(result)
}

pub fn write_text_tokens(tokens: &[TextToken], out: &mut Vec<u8>) {
    for token in tokens {
        match token {
            TextToken::Text(data) => out.extend_from_slice(data),
            TextToken::Newline => out.extend_from_slice(&[0xFF, 0x01]),
            TextToken::KeepText => out.extend_from_slice(&[0xFF, 0x02]),
            TextToken::Wait => out.extend_from_slice(&[0xFF, 0x03]),
            TextToken::GetInt(var) => {
                out.extend_from_slice(&[0xFF, 0x04]);
                var.write(out);
            }
            TextToken::GetVerb(var) => {
                out.extend_from_slice(&[0xFF, 0x05]);
                var.write(out);
            }
            TextToken::GetName(var) => {
                out.extend_from_slice(&[0xFF, 0x06]);
                var.write(out);
            }
            TextToken::GetString(var) => {
                out.extend_from_slice(&[0xFF, 0x07]);
                var.write(out);
            }
            TextToken::StartAnim(v) => {
                out.extend_from_slice(&[0xFF, 0x09]);
                out.extend_from_slice(&v.to_le_bytes());
            }
            TextToken::SetColor(v) => {
                out.extend_from_slice(&[0xFF, 0x0C]);
                out.extend_from_slice(&v.to_le_bytes());
            }
            TextToken::SetFont(v) => {
                out.extend_from_slice(&[0xFF, 0x0E]);
                out.extend_from_slice(&v.to_le_bytes());
            }
        }
    }
    out.push(0x00);
}

fn read_u8(cur: &mut Cursor<&[u8]>) -> Result<u8, ShuffleError> {
    let at = cur.position();
    cur.read_le()
        .map_err(|e| ShuffleError::decode_at(at, format!("truncated text stream: {e}")))
}

fn read_i16(cur: &mut Cursor<&[u8]>) -> Result<i16, ShuffleError> {
    let at = cur.position();
    cur.read_le()
        .map_err(|e| ShuffleError::decode_at(at, format!("truncated text escape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(bytes: &[u8]) -> Vec<TextToken> {
        read_text_tokens(&mut Cursor::new(bytes)).unwrap()
    }

    fn encode(tokens: &[TextToken]) -> Vec<u8> {
        let mut out = Vec::new();
        write_text_tokens(tokens, &mut out);
        out
    }

    #[test]
    fn plain_text_run() {
        let tokens = decode(b"Three-headed monkey!\x00");
        assert_eq!(tokens, vec![TextToken::Text(b"Three-headed monkey!".to_vec())]);
    }

    #[test]
    fn escapes_flush_the_literal_run() {
        let bytes = b"Deep in the\xFF\x01Caribbean\x00";
        let tokens = decode(bytes);
        assert_eq!(
            tokens,
            vec![
                TextToken::Text(b"Deep in the".to_vec()),
                TextToken::Newline,
                TextToken::Text(b"Caribbean".to_vec()),
            ]
        );
        assert_eq!(encode(&tokens), bytes);
    }

    #[test]
    fn var_substitution_token() {
        let bytes = [0xFF, 0x04, 0x22, 0x00, b'!', 0x00];
        let tokens = decode(&bytes);
        assert_eq!(
            tokens,
            vec![
                TextToken::GetInt(VarRef::new(0x22)),
                TextToken::Text(b"!".to_vec()),
            ]
        );
        assert_eq!(encode(&tokens), bytes);
    }

    #[test]
    fn word_escapes_round_trip() {
        let tokens = vec![
            TextToken::SetColor(5),
            TextToken::Text(b"arr".to_vec()),
            TextToken::SetFont(-1),
            TextToken::StartAnim(3),
            TextToken::Wait,
        ];
        assert_eq!(decode(&encode(&tokens)), tokens);
    }

    #[test]
    fn fe_escape_is_accepted() {
        let tokens = decode(&[b'a', 0xFE, 0x03, 0x00]);
        assert_eq!(tokens, vec![TextToken::Text(b"a".to_vec()), TextToken::Wait]);
    }
}
