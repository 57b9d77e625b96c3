//! The BAM header: SAM header text plus the binary reference dictionary.
//!
//! Records refer to references by index into [`BamHeader::references`], so the
//! dictionary read from the binary header is authoritative. The text is kept
//! verbatim and only parsed when a `@PG` record is appended.

use anyhow::{Context, Result};
use bstr::BString;
use noodles::sam::Header;
use noodles::sam::header::record::value::Map;
use noodles::sam::header::record::value::map::Program;
use noodles::sam::header::record::value::map::program::tag;
use std::collections::HashSet;
use std::io;

/// Magic bytes opening every BAM stream.
pub const BAM_MAGIC: &[u8; 4] = b"BAM\x01";

/// Program ID used for `@PG` records written by this tool.
pub const PROGRAM_ID: &str = "shardseq";

/// One entry in the reference dictionary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    pub name: String,
    pub length: u32,
}

impl ReferenceSequence {
    #[must_use]
    pub fn new(name: impl Into<String>, length: u32) -> Self {
        Self { name: name.into(), length }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BamHeader {
    text: String,
    references: Vec<ReferenceSequence>,
}

fn invalid_data(message: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.into())
}

fn read_i32<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<i32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

fn read_length<R: io::Read + ?Sized>(reader: &mut R, what: &str) -> io::Result<usize> {
    let value = read_i32(reader)?;
    usize::try_from(value).map_err(|_| invalid_data(format!("Negative {what}: {value}")))
}

impl BamHeader {
    #[must_use]
    pub fn new(text: impl Into<String>, references: Vec<ReferenceSequence>) -> Self {
        Self { text: text.into(), references }
    }

    /// Header whose text is an `@HD` line followed by one `@SQ` line per reference.
    #[must_use]
    pub fn from_references(references: Vec<ReferenceSequence>) -> Self {
        let mut text = String::from("@HD\tVN:1.6\n");
        for reference in &references {
            text.push_str(&format!("@SQ\tSN:{}\tLN:{}\n", reference.name, reference.length));
        }
        Self { text, references }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn references(&self) -> &[ReferenceSequence] {
        &self.references
    }

    /// Reference at `id`, or `None` for negative or unknown indices.
    #[must_use]
    pub fn reference(&self, id: i32) -> Option<&ReferenceSequence> {
        usize::try_from(id).ok().and_then(|i| self.references.get(i))
    }

    #[must_use]
    pub fn reference_name(&self, id: i32) -> Option<&str> {
        self.reference(id).map(|r| r.name.as_str())
    }

    /// Index of the reference called `name`.
    #[must_use]
    pub fn reference_id(&self, name: &str) -> Option<i32> {
        self.references.iter().position(|r| r.name == name).map(|i| i as i32)
    }

    /// Reads the header from the start of a decompressed BAM stream, leaving
    /// `reader` at the first record.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` for a bad magic number, negative lengths, or
    /// non-UTF-8 text, and `UnexpectedEof` if the stream ends inside the header.
    pub fn read_from<R: io::Read + ?Sized>(reader: &mut R) -> io::Result<Self> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != BAM_MAGIC {
            return Err(invalid_data(format!("Invalid BAM magic: {magic:02x?}")));
        }

        let l_text = read_length(reader, "header text length")?;
        let mut text = vec![0u8; l_text];
        reader.read_exact(&mut text)?;
        // Some writers pad the text with NULs.
        while text.last() == Some(&0) {
            text.pop();
        }
        let text = String::from_utf8(text).map_err(|e| invalid_data(format!("Header text is not UTF-8: {e}")))?;

        let n_ref = read_length(reader, "reference count")?;
        let mut references = Vec::with_capacity(n_ref.min(1 << 16));
        for _ in 0..n_ref {
            let l_name = read_length(reader, "reference name length")?;
            let mut name = vec![0u8; l_name];
            reader.read_exact(&mut name)?;
            if name.last() == Some(&0) {
                name.pop();
            }
            let name = String::from_utf8(name)
                .map_err(|e| invalid_data(format!("Reference name is not UTF-8: {e}")))?;
            let length = read_i32(reader)?;
            let length =
                u32::try_from(length).map_err(|_| invalid_data(format!("Negative length for reference {name}")))?;
            references.push(ReferenceSequence { name, length });
        }

        Ok(Self { text, references })
    }

    /// Writes the binary header.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: io::Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(BAM_MAGIC)?;
        writer.write_all(&(self.text.len() as i32).to_le_bytes())?;
        writer.write_all(self.text.as_bytes())?;
        writer.write_all(&(self.references.len() as i32).to_le_bytes())?;
        for reference in &self.references {
            writer.write_all(&((reference.name.len() + 1) as i32).to_le_bytes())?;
            writer.write_all(reference.name.as_bytes())?;
            writer.write_all(&[0u8])?;
            writer.write_all(&(reference.length as i32).to_le_bytes())?;
        }
        Ok(())
    }

    /// Copy of this header with a `@PG` record for this tool appended to the
    /// end of the existing program chain.
    ///
    /// # Errors
    ///
    /// Returns an error if the header text cannot be parsed or re-serialized.
    pub fn with_program(&self, version: &str, command_line: &str) -> Result<Self> {
        let mut header: Header = self.text.parse().context("Failed to parse SAM header text")?;
        let previous = last_program_id(&header);
        let id = unique_program_id(&header, PROGRAM_ID);

        let mut builder = Map::<Program>::builder()
            .insert(tag::NAME, PROGRAM_ID)
            .insert(tag::VERSION, version)
            .insert(tag::COMMAND_LINE, command_line);
        if let Some(pp) = previous.as_deref() {
            builder = builder.insert(tag::PREVIOUS_PROGRAM_ID, pp);
        }
        header.programs_mut().add(BString::from(id), builder.build()?)?;

        let mut writer = noodles::sam::io::Writer::new(Vec::new());
        writer.write_header(&header)?;
        let text = String::from_utf8(writer.into_inner()).context("Serialized header is not UTF-8")?;
        Ok(Self { text, references: self.references.clone() })
    }
}

/// The program no other program names as its `PP`.
fn last_program_id(header: &Header) -> Option<String> {
    let programs = header.programs();
    let program_map = programs.as_ref();

    let referenced: HashSet<&[u8]> = program_map
        .values()
        .filter_map(|pg| pg.other_fields().get(&tag::PREVIOUS_PROGRAM_ID))
        .map(AsRef::as_ref)
        .collect();

    program_map
        .keys()
        .find(|id| !referenced.contains(id.as_slice()))
        .or_else(|| program_map.keys().next())
        .map(|id| String::from_utf8_lossy(id).to_string())
}

fn unique_program_id(header: &Header, base_id: &str) -> String {
    let programs = header.programs();
    let program_map = programs.as_ref();
    if !program_map.contains_key(base_id.as_bytes()) {
        return base_id.to_string();
    }
    (1..)
        .map(|i| format!("{base_id}.{i}"))
        .find(|candidate| !program_map.contains_key(candidate.as_bytes()))
        .unwrap_or_else(|| base_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn two_references() -> BamHeader {
        BamHeader::from_references(vec![ReferenceSequence::new("chr1", 1000), ReferenceSequence::new("chr2", 500)])
    }

    #[test]
    fn test_from_references_text() {
        let header = two_references();
        assert_eq!(header.text(), "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n@SQ\tSN:chr2\tLN:500\n");
    }

    #[test]
    fn test_lookups() {
        let header = two_references();
        assert_eq!(header.reference_name(1), Some("chr2"));
        assert_eq!(header.reference_name(-1), None);
        assert_eq!(header.reference_name(2), None);
        assert_eq!(header.reference_id("chr1"), Some(0));
        assert_eq!(header.reference_id("chrM"), None);
        assert_eq!(header.reference(0).map(|r| r.length), Some(1000));
    }

    #[test]
    fn test_write_then_read() {
        let header = two_references();
        let mut bytes = Vec::new();
        header.write_to(&mut bytes).unwrap();
        bytes.extend_from_slice(b"record");

        let mut cursor = Cursor::new(bytes);
        let parsed = BamHeader::read_from(&mut cursor).unwrap();
        assert_eq!(parsed, header);
        // Positioned at the first record.
        let mut rest = Vec::new();
        io::Read::read_to_end(&mut cursor, &mut rest).unwrap();
        assert_eq!(rest, b"record");
    }

    #[test]
    fn test_padded_text_is_trimmed() {
        let mut bytes = BAM_MAGIC.to_vec();
        bytes.extend_from_slice(&6i32.to_le_bytes());
        bytes.extend_from_slice(b"@HD\n\0\0");
        bytes.extend_from_slice(&0i32.to_le_bytes());
        let header = BamHeader::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(header.text(), "@HD\n");
        assert!(header.references().is_empty());
    }

    #[test]
    fn test_bad_magic() {
        let error = BamHeader::read_from(&mut Cursor::new(b"BAM\x02\0\0\0\0".to_vec())).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_truncated_header() {
        let mut bytes = Vec::new();
        two_references().write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() - 3);
        let error = BamHeader::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_with_program_on_fresh_header() {
        let header = two_references().with_program("0.1.0", "shardseq clip -i in.bam").unwrap();
        let text = header.text();
        assert!(text.contains("@PG\tID:shardseq"));
        assert!(text.contains("VN:0.1.0"));
        assert!(text.contains("CL:shardseq clip -i in.bam"));
        assert!(!text.contains("PP:"));
        assert_eq!(header.references().len(), 2);
    }

    #[test]
    fn test_with_program_chains_and_deduplicates() {
        let header = BamHeader::new("@HD\tVN:1.6\n@PG\tID:shardseq\tPN:shardseq\n", Vec::new());
        let header = header.with_program("0.1.0", "cmd").unwrap();
        assert!(header.text().contains("ID:shardseq.1"));
        assert!(header.text().contains("PP:shardseq"));
    }
}
