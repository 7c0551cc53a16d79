//! PCM WAV input.
//!
//! Uses `hound` to parse the RIFF header, then hands the raw `data` chunk to
//! the scheduler byte for byte. Nothing is decoded: only integer PCM at 8 or
//! 16 bits is accepted.

use std::fs::File;
use std::io::{BufReader, Read, Take};
use std::path::Path;

use crate::error::{PlayError, Result};
use crate::format::AudioFormat;
use crate::source::ReadSource;

/// A WAV file positioned at the start of its sample data.
pub struct WavSource<R> {
    pub format: AudioFormat,
    /// Length of the `data` chunk in bytes.
    pub data_bytes: u64,
    pub source: ReadSource<Take<R>>,
}

/// Open a WAV file from disk.
pub fn open_wav(path: &Path) -> Result<WavSource<BufReader<File>>> {
    let file = File::open(path).map_err(PlayError::SourceRead)?;
    from_reader(BufReader::new(file))
}

/// Parse a WAV header from `reader`.
pub fn from_reader<R: Read>(reader: R) -> Result<WavSource<R>> {
    let wav = hound::WavReader::new(reader)?;
    let spec = wav.spec();
    if spec.sample_format != hound::SampleFormat::Int {
        return Err(PlayError::InvalidFormat(
            "floating-point WAV data is not supported".to_string(),
        ));
    }
    let format = AudioFormat::new(spec.channels, spec.sample_rate, spec.bits_per_sample)?;
    let data_bytes = u64::from(wav.len()) * format.bytes_per_sample() as u64;

    tracing::debug!(%format, data_bytes, "wav header parsed");

    let inner = wav.into_inner();
    Ok(WavSource {
        format,
        data_bytes,
        source: ReadSource::new(inner.take(data_bytes)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::ByteSource;
    use std::io::Cursor;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i16]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn spec(channels: u16, bits: u16) -> hound::WavSpec {
        hound::WavSpec {
            channels,
            sample_rate: 22_050,
            bits_per_sample: bits,
            sample_format: hound::SampleFormat::Int,
        }
    }

    #[test]
    fn header_yields_format_and_raw_data() {
        let bytes = wav_bytes(spec(2, 16), &[1, -1, 256, -256]);
        let mut wav = from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(wav.format, AudioFormat::new(2, 22_050, 16).unwrap());
        assert_eq!(wav.data_bytes, 8);

        let mut buf = [0u8; 16];
        let n = wav.source.read_chunk(&mut buf).unwrap();
        assert_eq!(n, 8);
        assert_eq!(&buf[..8], &[1, 0, 0xff, 0xff, 0, 1, 0, 0xff]);
    }

    #[test]
    fn trailing_chunks_are_not_streamed() {
        let mut bytes = wav_bytes(spec(1, 16), &[7, 7]);
        bytes.extend_from_slice(b"LIST\x04\x00\x00\x00abcd");
        let mut wav = from_reader(Cursor::new(bytes)).unwrap();

        let mut buf = [0u8; 64];
        assert_eq!(wav.source.read_chunk(&mut buf).unwrap(), 4);
        assert_eq!(wav.source.read_chunk(&mut buf).unwrap(), 0);
    }

    #[test]
    fn unsupported_depth_is_rejected() {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec(1, 24)).unwrap();
            writer.write_sample(0i32).unwrap();
            writer.finalize().unwrap();
        }
        let result = from_reader(Cursor::new(cursor.into_inner()));
        assert!(matches!(result, Err(PlayError::InvalidFormat(_))));
    }

    #[test]
    fn garbage_is_a_wav_error() {
        let result = from_reader(Cursor::new(b"not a wav file at all".to_vec()));
        assert!(matches!(result, Err(PlayError::Wav(_))));
    }
}
