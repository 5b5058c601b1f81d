//! JSON struct-tag parsing.
//!
//! A raw struct tag is a sequence of `key:"value"` groups; only the
//! `json` key matters here. Its value is a comma-separated list where
//! the first item renames the field and the rest are flags. Unrelated
//! keys before or after the `json` group are tolerated.

use winnow::Parser as _;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonTag {
    /// The rename; empty keeps the source name, `-` drops the field.
    pub name: String,
    /// The raw `json` tag body, recorded as `go.tag.json` metadata.
    pub value: String,
    pub is_string: bool,
    pub omitempty: bool,
    pub inline: bool,
}

impl JsonTag {
    pub fn ignored(&self) -> bool {
        self.name == "-"
    }

    /// Extracts the `json` entry from a raw struct-tag string; `None`
    /// when the tag has no `json` key.
    pub fn from_struct_tag(tag: &str) -> Option<JsonTag> {
        let entries = parser::entries.parse_next(&mut &*tag).ok()?;
        let value = entries
            .into_iter()
            .find(|(key, _)| *key == "json")
            .map(|(_, value)| value)?;

        let mut items = value.split(',');
        let name = items.next().unwrap_or_default();
        let mut tag = JsonTag {
            name: name.to_owned(),
            value: value.to_owned(),
            ..JsonTag::default()
        };
        for flag in items {
            match flag {
                "string" => tag.is_string = true,
                "omitempty" => tag.omitempty = true,
                "inline" => tag.inline = true,
                _ => {}
            }
        }
        Some(tag)
    }
}

mod parser {
    use winnow::{
        Parser,
        combinator::{delimited, preceded, repeat},
        token::take_while,
    };

    pub fn entries<'a>(input: &mut &'a str) -> winnow::Result<Vec<(&'a str, &'a str)>> {
        repeat(0.., entry).parse_next(input)
    }

    fn entry<'a>(input: &mut &'a str) -> winnow::Result<(&'a str, &'a str)> {
        preceded(
            take_while(0.., char::is_whitespace),
            (
                take_while(1.., |c: char| !c.is_whitespace() && c != ':' && c != '"'),
                preceded(':', delimited('"', take_while(0.., |c| c != '"'), '"')),
            ),
        )
        .parse_next(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_tag_table() {
        let tt: &[(&str, Option<JsonTag>)] = &[
            ("", None),
            (r#"db:"id""#, None),
            (
                r#"json:"id""#,
                Some(JsonTag {
                    name: "id".into(),
                    value: "id".into(),
                    ..JsonTag::default()
                }),
            ),
            (
                r#"json:"id,whatever,else""#,
                Some(JsonTag {
                    name: "id".into(),
                    value: "id,whatever,else".into(),
                    ..JsonTag::default()
                }),
            ),
            (
                r#"json:"id,string""#,
                Some(JsonTag {
                    name: "id".into(),
                    value: "id,string".into(),
                    is_string: true,
                    ..JsonTag::default()
                }),
            ),
            (
                r#"json:"id,omitempty,string""#,
                Some(JsonTag {
                    name: "id".into(),
                    value: "id,omitempty,string".into(),
                    is_string: true,
                    omitempty: true,
                    ..JsonTag::default()
                }),
            ),
            (
                r#"json:",inline""#,
                Some(JsonTag {
                    name: "".into(),
                    value: ",inline".into(),
                    inline: true,
                    ..JsonTag::default()
                }),
            ),
            (
                r#"json:"-""#,
                Some(JsonTag {
                    name: "-".into(),
                    value: "-".into(),
                    ..JsonTag::default()
                }),
            ),
            (
                r#"xxx:"X X X" json:"id,string" yyy:"Y Y Y""#,
                Some(JsonTag {
                    name: "id".into(),
                    value: "id,string".into(),
                    is_string: true,
                    ..JsonTag::default()
                }),
            ),
            (
                r#"db:"id,omitempty,pk" json:"External_ID,string,omitempty" someOtherTag:"some,other:value""#,
                Some(JsonTag {
                    name: "External_ID".into(),
                    value: "External_ID,string,omitempty".into(),
                    is_string: true,
                    omitempty: true,
                    ..JsonTag::default()
                }),
            ),
        ];
        for (input, expected) in tt {
            assert_eq!(
                &JsonTag::from_struct_tag(input),
                expected,
                "tag: {input:?}"
            );
        }
    }

    #[test]
    fn ignored_field() {
        let tag = JsonTag::from_struct_tag(r#"json:"-""#).unwrap();
        assert!(tag.ignored());
    }
}
