use bytes::Bytes;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::error::{BoxError, Error};
use crate::util::truncate_body;

/// Turns a validated response body into a caller-facing value.
pub trait ResponseDecoder<T>: Send + Sync {
    fn decode(&self, body: &Bytes) -> std::result::Result<T, BoxError>;

    fn decode_body(&self, body: &Bytes) -> Result<T> {
        self.decode(body).map_err(|source| Error::Decoding {
            source,
            body: truncate_body(body),
        })
    }
}

impl<T, F> ResponseDecoder<T> for F
where
    F: Fn(&Bytes) -> std::result::Result<T, BoxError> + Send + Sync,
{
    fn decode(&self, body: &Bytes) -> std::result::Result<T, BoxError> {
        self(body)
    }
}

/// JSON via `serde_json`. An empty body decodes as `null`, so `()` and
/// `Option<T>` targets work for bodyless statuses such as 204.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonDecoder;

impl<T> ResponseDecoder<T> for JsonDecoder
where
    T: DeserializeOwned,
{
    fn decode(&self, body: &Bytes) -> std::result::Result<T, BoxError> {
        let input: &[u8] = if body.is_empty() { b"null" } else { body };
        serde_json::from_slice(input).map_err(Into::into)
    }
}

/// `application/x-www-form-urlencoded` via `serde_urlencoded`.
#[derive(Clone, Copy, Debug, Default)]
pub struct FormDecoder;

impl<T> ResponseDecoder<T> for FormDecoder
where
    T: DeserializeOwned,
{
    fn decode(&self, body: &Bytes) -> std::result::Result<T, BoxError> {
        serde_urlencoded::from_bytes(body).map_err(Into::into)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TextDecoder;

impl ResponseDecoder<String> for TextDecoder {
    fn decode(&self, body: &Bytes) -> std::result::Result<String, BoxError> {
        String::from_utf8(body.to_vec()).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde::Deserialize;

    use super::{FormDecoder, JsonDecoder, ResponseDecoder, TextDecoder};
    use crate::error::{BoxError, ErrorCode};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: u32,
    }

    #[test]
    fn json_decoder_reads_list() {
        let items: Vec<Item> = JsonDecoder
            .decode_body(&Bytes::from_static(br#"[{"id":1}]"#))
            .expect("json list should decode");
        assert_eq!(items, vec![Item { id: 1 }]);
    }

    #[test]
    fn json_decoder_maps_empty_body_to_none() {
        let decoded: Option<Item> = JsonDecoder
            .decode_body(&Bytes::new())
            .expect("empty body should decode as null");
        assert_eq!(decoded, None);
    }

    #[test]
    fn json_decoder_failure_is_classified_with_body() {
        let error = ResponseDecoder::<Item>::decode_body(&JsonDecoder, &Bytes::from_static(b"{oops"))
            .expect_err("malformed json must fail");
        assert_eq!(error.code(), ErrorCode::Decoding);
        assert!(error.to_string().contains("body={oops"));
    }

    #[test]
    fn form_and_text_decoders() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Token {
            access_token: String,
        }

        let token: Token = FormDecoder
            .decode_body(&Bytes::from_static(b"access_token=a%20b"))
            .expect("form should decode");
        assert_eq!(token.access_token, "a b");

        let text = TextDecoder
            .decode_body(&Bytes::from_static("héllo".as_bytes()))
            .expect("utf-8 should decode");
        assert_eq!(text, "héllo");
    }

    #[test]
    fn closures_are_decoders() {
        let decoder = |body: &Bytes| -> Result<usize, BoxError> { Ok(body.len()) };
        let length = decoder
            .decode_body(&Bytes::from_static(b"abc"))
            .expect("closure decoder should succeed");
        assert_eq!(length, 3);
    }
}
