// User-facing message texts

use crate::domain::model::{JobReport, ProbeReport, Session, SessionState};
use crate::planner::KeyframeIndex;
use crate::utils::Utils;

pub fn welcome(max_upload: u64, max_segment: u32) -> String {
    format!(
        "Welcome to the video splitter.\n\
         Send a video (up to {}) and then the clip length in seconds \
         (at most {}). You will get the video back as numbered clips.\n\
         Commands: /clip /status /cancel /help",
        Utils::format_file_size(max_upload),
        max_segment
    )
}

pub fn help() -> String {
    "1. Send a video file\n\
     2. Send the clip length: seconds (30), MM:SS or HH:MM:SS\n\
     3. Wait for your clips\n\
     /status shows progress, /cancel stops the current job"
        .to_string()
}

pub fn send_video() -> &'static str {
    "Send me the video you want to split."
}

pub fn ask_duration(file_name: Option<&str>, max_segment: u32) -> String {
    let name = file_name.unwrap_or("your video");
    format!(
        "Got {}. Now send the length of each clip in seconds (1-{}).",
        name, max_segment
    )
}

pub fn too_large(size: u64, limit: u64) -> String {
    format!(
        "That file is {}; the limit is {}. Please send a smaller video.",
        Utils::format_file_size(size),
        Utils::format_file_size(limit)
    )
}

pub fn busy(session: &Session) -> String {
    format!(
        "Your previous video is still being processed ({}). Use /cancel to stop it.",
        progress(session)
    )
}

pub fn no_video_yet() -> &'static str {
    "Please send a video first, or use /clip."
}

pub fn unknown_command(command: &str) -> String {
    format!("Unknown command {}.\n{}", command, help())
}

pub fn nothing_to_cancel() -> &'static str {
    "There is nothing to cancel."
}

pub fn cancelling() -> &'static str {
    "Cancelling your job..."
}

pub fn input_cancelled() -> &'static str {
    "Cancelled. Send a video whenever you are ready."
}

pub fn status(session: Option<&Session>) -> String {
    match session {
        None => "No active session. Send a video to begin.".to_string(),
        Some(session) => format!("Status: {}", progress(session)),
    }
}

fn progress(session: &Session) -> String {
    match (&session.active_job, session.state) {
        (Some(job), SessionState::Cutting) if job.segments_total > 0 => format!(
            "{}, {}/{} clips cut",
            session.state, job.segments_done, job.segments_total
        ),
        _ => session.state.to_string(),
    }
}

pub fn probing() -> &'static str {
    "Processing your video: downloading and inspecting..."
}

pub fn media_summary(report: &ProbeReport) -> String {
    let mut parts = vec![
        format!("duration {}", Utils::format_clock(report.duration)),
        format!("codec {}", report.codec),
    ];
    let details = &report.details;
    if let (Some(w), Some(h)) = (details.width, details.height) {
        parts.push(format!("{}x{}", w, h));
    }
    if let Some(fps) = details.fps {
        parts.push(format!("{:.2} fps", fps));
    }
    if let Some(bps) = details.bit_rate {
        parts.push(Utils::format_bit_rate(bps));
    }
    if let Some(size) = details.size_bytes {
        parts.push(Utils::format_file_size(size));
    }
    if let Some(gop) = KeyframeIndex::new(report.keyframes.clone()).average_interval() {
        parts.push(format!("keyframe every {:.1}s", gop));
    }
    format!("Video: {}", parts.join(", "))
}

pub fn cutting(count: usize, segment_length: u32) -> String {
    format!("Cutting {} clips of {}s...", count, segment_length)
}

pub fn clip_caption(number: usize, total: usize, segment_length: u32) -> String {
    format!("Clip {}/{} ({}s each)", number, total, segment_length)
}

pub fn whole_file_caption(segment_length: u32) -> String {
    format!(
        "Video is no longer than {}s; sending it unchanged",
        segment_length
    )
}

pub fn invalid_length(reason: &str, max_segment: u32) -> String {
    format!(
        "{}. Send a whole number of seconds (1-{}).",
        reason, max_segment
    )
}

pub fn done(report: &JobReport) -> String {
    let total = report.deliveries.len();
    let delivered = report.delivered_count();
    let failed = report.failed_deliveries();
    if failed.is_empty() {
        format!(
            "Done: {} of {} clips sent in {}.",
            delivered,
            total,
            Utils::format_elapsed(report.elapsed)
        )
    } else {
        let list = failed
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Done: {} of {} clips sent; clips {} could not be delivered.",
            delivered, total, list
        )
    }
}

pub fn failed(reason: &str) -> String {
    format!("Processing failed: {}", reason)
}

pub fn cancelled() -> &'static str {
    "Job cancelled. Temporary files were removed."
}
