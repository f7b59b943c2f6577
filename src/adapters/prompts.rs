//! Prompt templates for the analysis model.

/// Prompt asking for a segment-by-segment analysis of a transcript
pub fn analysis_prompt(transcript: &str, sections: Option<u32>) -> String {
    let scope = match sections {
        Some(n) => format!("Split the transcript into exactly {} sections.", n),
        None => "Split the transcript into as many sections as its topics warrant.".to_string(),
    };
    format!(
        "You are an editor selecting material for short-form video.\n\
         {scope}\n\
         For each section give a title, a two-sentence summary, the strongest quote, \
         and a 1-10 score for how well it would stand alone as a short clip with a reason.\n\
         Finish with the three best clip candidates ranked.\n\n\
         TRANSCRIPT:\n{transcript}\n"
    )
}

/// Prompt asking for clip ranges as strict JSON
pub fn timestamps_prompt(subtitles: &str, analysis: &str) -> String {
    format!(
        "Using the analysis and the timed subtitles below, choose the best self-contained \
         clips, each between 20 and 90 seconds long.\n\
         Reply with JSON only, no commentary, in exactly this shape:\n\
         {{\"segments\": [{{\"start_time\": \"HH:MM:SS,mmm\", \"end_time\": \"HH:MM:SS,mmm\"}}]}}\n\
         Times must come from the subtitle timings.\n\n\
         ANALYSIS:\n{analysis}\n\n\
         SUBTITLES (SRT):\n{subtitles}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analysis_prompt_sections() {
        assert!(analysis_prompt("hi", Some(4)).contains("exactly 4 sections"));
        assert!(analysis_prompt("hi", None).contains("as many sections"));
        assert!(analysis_prompt("the words", None).ends_with("the words\n"));
    }

    #[test]
    fn test_timestamps_prompt_shape() {
        let prompt = timestamps_prompt("1\n00:00:01,000 --> 00:00:02,000\nhi", "great bit");
        assert!(prompt.contains(r#"{"segments": [{"start_time""#));
        assert!(prompt.contains("great bit"));
    }
}
