//! WAV encoding and audio math helpers.
//!
//! Pure functions — no I/O, no async runtime.

/// Capture sample rate for voice input (16 kHz mono).
pub const SAMPLE_RATE: u32 = 16_000;

/// Normalized RMS level of 16-bit PCM samples, 0.0–1.0.
pub fn compute_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let v = s as f64 / 32768.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Encode raw 16-bit mono PCM samples as a complete WAV file.
pub fn write_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut buf = Vec::with_capacity(44 + data_len as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&1u16.to_le_bytes()); // mono
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * 2).to_le_bytes()); // byte rate
    buf.extend_from_slice(&2u16.to_le_bytes()); // block align
    buf.extend_from_slice(&16u16.to_le_bytes()); // bits per sample

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        buf.extend_from_slice(&sample.to_le_bytes());
    }

    buf
}

/// Repair WAV buffers with indeterminate chunk sizes.
///
/// Streaming synthesis engines write with chunked transfer encoding and put
/// `0xFFFFFFFF` in the RIFF and `data` size fields. Once the whole body has
/// been buffered the real sizes are known, so patch them in place.
pub fn fix_wav_sizes(mut wav: Vec<u8>) -> Vec<u8> {
    if wav.len() < 44 || &wav[0..4] != b"RIFF" {
        return wav;
    }

    let riff_size = (wav.len() - 8) as u32;
    wav[4..8].copy_from_slice(&riff_size.to_le_bytes());

    // Walk sub-chunks looking for "data"
    let mut pos = 12;
    while pos + 8 <= wav.len() {
        if &wav[pos..pos + 4] == b"data" {
            let data_size = (wav.len() - pos - 8) as u32;
            wav[pos + 4..pos + 8].copy_from_slice(&data_size.to_le_bytes());
            break;
        }
        let chunk_size =
            u32::from_le_bytes([wav[pos + 4], wav[pos + 5], wav[pos + 6], wav[pos + 7]]);
        let skip = if chunk_size == 0xFFFFFFFF {
            0
        } else {
            chunk_size as usize
        };
        pos += 8 + skip;
    }

    wav
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_wav_header_shape() {
        let wav = write_wav(&vec![0i16; 100], SAMPLE_RATE);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(wav.len(), 44 + 200);
    }

    #[test]
    fn write_wav_sample_rate_encoded() {
        let wav = write_wav(&[0i16; 4], 24_000);
        let rate = u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]);
        assert_eq!(rate, 24_000);
    }

    #[test]
    fn rms_silence_is_zero() {
        assert_eq!(compute_rms(&vec![0i16; 512]), 0.0);
        assert_eq!(compute_rms(&[]), 0.0);
    }

    #[test]
    fn rms_half_scale() {
        let rms = compute_rms(&vec![16384i16; 100]);
        assert!(rms > 0.4 && rms < 0.6, "rms={rms}");
    }

    #[test]
    fn fix_wav_sizes_patches_sentinels() {
        let mut wav = write_wav(&vec![0i16; 50], SAMPLE_RATE);
        wav[4..8].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());
        wav[40..44].copy_from_slice(&0xFFFFFFFFu32.to_le_bytes());

        let fixed = fix_wav_sizes(wav);
        let riff = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
        let data = u32::from_le_bytes([fixed[40], fixed[41], fixed[42], fixed[43]]);
        assert_eq!(riff, (fixed.len() - 8) as u32);
        assert_eq!(data, (fixed.len() - 44) as u32);
    }

    #[test]
    fn fix_wav_sizes_noop_on_good_wav() {
        let wav = write_wav(&vec![0i16; 50], SAMPLE_RATE);
        assert_eq!(fix_wav_sizes(wav.clone()), wav);
    }

    #[test]
    fn fix_wav_sizes_ignores_non_riff() {
        let junk = vec![0u8; 64];
        assert_eq!(fix_wav_sizes(junk.clone()), junk);
    }
}
