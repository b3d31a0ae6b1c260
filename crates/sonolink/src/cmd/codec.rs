use sonolink_frame::{encode as encode_frame, Reading};
use sonolink_node::Thresholds;
use tracing::debug;

use crate::cmd::{DecodeArgs, EncodeArgs};
use crate::exit::{frame_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_frame, print_reading, OutputFormat};

pub fn encode(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let reading = Reading::new(args.distance, args.light);
    let frame = encode_frame(&reading);
    print_frame(&frame, &reading, format);
    Ok(SUCCESS)
}

pub fn decode(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let bytes = parse_hex(&args.hex)?;
    debug!(len = bytes.len(), "decoding frame");

    let reading =
        sonolink_frame::decode(&bytes).map_err(|err| frame_error("invalid frame", err))?;
    print_reading(&reading, Thresholds::default().classify(reading.distance_cm), format);
    Ok(SUCCESS)
}

/// Accepts `55 00 00 48 ...`, `5500004841...` or `0x55 0x00 ...`, possibly
/// split over several arguments.
fn parse_hex(parts: &[String]) -> CliResult<Vec<u8>> {
    let digits: String = parts
        .iter()
        .flat_map(|part| part.split(|c: char| c.is_whitespace() || c == ':' || c == ','))
        .map(|token| {
            token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token)
        })
        .collect();

    hex::decode(&digits)
        .map_err(|err| CliError::new(DATA_INVALID, format!("invalid hex input: {err}")))
}
