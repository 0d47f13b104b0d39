//! Engine argument vectors for each operation.

use super::types::{CompressionLevel, Operation, TargetFormat, TimeRange, TranscodeParams};

/// Audio codec and bitrate for an extracted audio format.
fn audio_codec(format: TargetFormat) -> (&'static str, Option<&'static str>) {
    match format {
        TargetFormat::Mp3 => ("libmp3lame", Some("192k")),
        TargetFormat::Wav => ("pcm_s16le", None),
        _ => ("aac", Some("192k")),
    }
}

/// Seconds as the engine expects them: `5`, `1.5`.
fn secs(value: f64) -> String {
    format!("{}", value)
}

fn push_range(args: &mut Vec<String>, range: &TimeRange) {
    args.push("-ss".to_string());
    args.push(secs(range.start_secs));
    args.push("-t".to_string());
    args.push(secs(range.duration_secs));
}

fn push(args: &mut Vec<String>, items: &[&str]) {
    args.extend(items.iter().map(|s| s.to_string()));
}

fn encode_args(
    input: &str,
    output: &str,
    params: &TranscodeParams,
    crf: u8,
    audio_bitrate: &str,
) -> Vec<String> {
    let mut args = vec!["-i".to_string(), input.to_string()];
    if let Some(range) = &params.range {
        push_range(&mut args, range);
    }
    push(&mut args, &["-c:v", params.video_codec(), "-preset", params.preset()]);
    args.push("-crf".to_string());
    args.push(crf.to_string());
    push(&mut args, &["-c:a", params.audio_codec(), "-b:a", audio_bitrate]);
    if let Some(resolution) = &params.resolution {
        args.push("-vf".to_string());
        args.push(format!("scale={}", resolution));
    }
    args.push(output.to_string());
    args
}

/// Builds the argument vector for `operation` reading `input` and writing
/// `output`, both engine scratch names.
pub fn build_args(operation: &Operation, input: &str, output: &str) -> Vec<String> {
    match operation {
        Operation::Transcode { params, .. } => {
            encode_args(input, output, params, params.crf(), params.audio_bitrate())
        }
        Operation::Compress { level } => encode_args(
            input,
            output,
            &TranscodeParams::default(),
            level.crf(),
            CompressionLevel::AUDIO_BITRATE,
        ),
        Operation::ExtractAudio { format } => {
            let (codec, bitrate) = audio_codec(*format);
            let mut args = vec!["-i".to_string(), input.to_string()];
            push(&mut args, &["-vn", "-acodec", codec]);
            if let Some(bitrate) = bitrate {
                push(&mut args, &["-b:a", bitrate]);
            }
            args.push(output.to_string());
            args
        }
        Operation::Trim { range } => {
            let mut args = vec!["-i".to_string(), input.to_string()];
            push_range(&mut args, range);
            push(&mut args, &["-c", "copy", output]);
            args
        }
        Operation::Gif { params } => {
            let mut args = vec!["-i".to_string(), input.to_string()];
            push_range(&mut args, &params.range());
            args.push("-vf".to_string());
            args.push(format!(
                "fps={},scale={}:-1:flags=lanczos",
                params.fps, params.width
            ));
            push(&mut args, &["-loop", "0", output]);
            args
        }
    }
}
