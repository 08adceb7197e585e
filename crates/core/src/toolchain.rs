//! ffmpeg / ffprobe operations used by the compositing tools.
//!
//! Argument lists are built by pure functions so they can be checked
//! without the binaries installed; [`MediaToolchain`] runs them.

use crate::error::{ToolError, ToolResult};
use crate::process;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Paths to the media binaries.
#[derive(Debug, Clone)]
pub struct MediaToolchain {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl MediaToolchain {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Stream and container metadata as reported by ffprobe.
    pub async fn probe(&self, input: &Path) -> ToolResult<serde_json::Value> {
        let output = process::run(&self.ffprobe, probe_args(input)).await?;
        serde_json::from_str(&output.stdout).map_err(|e| ToolError::SubprocessFailed {
            program: self.ffprobe.display().to_string(),
            status: "unparseable output".to_string(),
            tail: e.to_string(),
        })
    }

    /// Join inputs end to end with the concat demuxer. The list file is
    /// written to `workdir`.
    pub async fn concatenate(
        &self,
        inputs: &[PathBuf],
        output: &Path,
        workdir: &Path,
    ) -> ToolResult<()> {
        let list = workdir.join("concat-list.txt");
        tokio::fs::write(&list, concat_list(inputs))
            .await
            .map_err(|e| ToolError::storage(format!("cannot write {}: {}", list.display(), e)))?;
        self.ffmpeg(concat_args(&list, output)).await
    }

    pub async fn combine_audio_video(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> ToolResult<()> {
        self.ffmpeg(combine_args(video, audio, output)).await
    }

    pub async fn wav_to_mp3(&self, input: &Path, output: &Path) -> ToolResult<()> {
        self.ffmpeg(mp3_args(input, output)).await
    }

    /// Two-pass GIF conversion: palette generation, then palette use.
    pub async fn video_to_gif(
        &self,
        input: &Path,
        output: &Path,
        options: GifOptions,
        workdir: &Path,
    ) -> ToolResult<()> {
        let palette = workdir.join("palette.png");
        self.ffmpeg(palette_args(input, &palette, options)).await?;
        self.ffmpeg(gif_args(input, &palette, output, options)).await
    }

    pub async fn overlay_image(
        &self,
        video: &Path,
        image: &Path,
        x: i64,
        y: i64,
        output: &Path,
    ) -> ToolResult<()> {
        self.ffmpeg(overlay_args(video, image, x, y, output)).await
    }

    pub async fn adjust_volume(
        &self,
        input: &Path,
        db_change: f64,
        output: &Path,
    ) -> ToolResult<()> {
        self.ffmpeg(volume_args(input, db_change, output)).await
    }

    /// Mix several audio tracks into one, as long as the longest input.
    pub async fn layer_audio(&self, inputs: &[PathBuf], output: &Path) -> ToolResult<()> {
        self.ffmpeg(layer_args(inputs, output)).await
    }

    async fn ffmpeg(&self, args: Vec<OsString>) -> ToolResult<()> {
        process::run(&self.ffmpeg, args).await.map(|_| ())
    }
}

/// Scale and frame-rate settings for GIF output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GifOptions {
    /// Output width as a fraction of the input width.
    pub scale_width_factor: f64,
    pub fps: u32,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            scale_width_factor: 0.33,
            fps: 15,
        }
    }
}

fn os(s: impl Into<OsString>) -> OsString {
    s.into()
}

pub fn probe_args(input: &Path) -> Vec<OsString> {
    vec![
        os("-v"),
        os("quiet"),
        os("-print_format"),
        os("json"),
        os("-show_format"),
        os("-show_streams"),
        input.as_os_str().to_owned(),
    ]
}

/// Concat demuxer list, one `file '<path>'` line per input.
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|p| format!("file '{}'\n", p.display().to_string().replace('\'', "'\\''")))
        .collect()
}

pub fn concat_args(list: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-f"),
        os("concat"),
        os("-safe"),
        os("0"),
        os("-i"),
        list.as_os_str().to_owned(),
        os("-c"),
        os("copy"),
        output.as_os_str().to_owned(),
    ]
}

pub fn combine_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        video.as_os_str().to_owned(),
        os("-i"),
        audio.as_os_str().to_owned(),
        os("-map"),
        os("0:v"),
        os("-map"),
        os("1:a"),
        os("-c:v"),
        os("copy"),
        os("-c:a"),
        os("aac"),
        os("-shortest"),
        output.as_os_str().to_owned(),
    ]
}

pub fn mp3_args(input: &Path, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        input.as_os_str().to_owned(),
        os("-acodec"),
        os("libmp3lame"),
        os("-q:a"),
        os("2"),
        output.as_os_str().to_owned(),
    ]
}

fn gif_filter(options: GifOptions) -> String {
    format!(
        "fps={},scale=trunc(iw*{}/2)*2:-1:flags=lanczos",
        options.fps, options.scale_width_factor
    )
}

pub fn palette_args(input: &Path, palette: &Path, options: GifOptions) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        input.as_os_str().to_owned(),
        os("-vf"),
        os(format!("{},palettegen", gif_filter(options))),
        palette.as_os_str().to_owned(),
    ]
}

pub fn gif_args(input: &Path, palette: &Path, output: &Path, options: GifOptions) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        input.as_os_str().to_owned(),
        os("-i"),
        palette.as_os_str().to_owned(),
        os("-filter_complex"),
        os(format!("{}[x];[x][1:v]paletteuse", gif_filter(options))),
        output.as_os_str().to_owned(),
    ]
}

pub fn overlay_args(video: &Path, image: &Path, x: i64, y: i64, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        video.as_os_str().to_owned(),
        os("-i"),
        image.as_os_str().to_owned(),
        os("-filter_complex"),
        os(format!("[0:v][1:v]overlay={}:{}", x, y)),
        os("-c:a"),
        os("copy"),
        output.as_os_str().to_owned(),
    ]
}

pub fn volume_args(input: &Path, db_change: f64, output: &Path) -> Vec<OsString> {
    vec![
        os("-y"),
        os("-i"),
        input.as_os_str().to_owned(),
        os("-af"),
        os(format!("volume={}dB", db_change)),
        output.as_os_str().to_owned(),
    ]
}

pub fn layer_args(inputs: &[PathBuf], output: &Path) -> Vec<OsString> {
    let mut args = vec![os("-y")];
    for input in inputs {
        args.push(os("-i"));
        args.push(input.as_os_str().to_owned());
    }
    args.push(os("-filter_complex"));
    args.push(os(format!(
        "amix=inputs={}:duration=longest:dropout_transition=2",
        inputs.len()
    )));
    args.push(output.as_os_str().to_owned());
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_concat_list_quotes_paths() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_combine_args_map_streams() {
        let args = strings(combine_args(
            Path::new("v.mp4"),
            Path::new("a.wav"),
            Path::new("out.mp4"),
        ));
        assert_eq!(&args[..5], ["-y", "-i", "v.mp4", "-i", "a.wav"]);
        assert!(args.windows(2).any(|w| w == ["-map", "0:v"]));
        assert!(args.windows(2).any(|w| w == ["-map", "1:a"]));
        assert!(args.contains(&"-shortest".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_gif_filters() {
        let options = GifOptions {
            scale_width_factor: 0.5,
            fps: 10,
        };
        let palette = strings(palette_args(Path::new("in.mp4"), Path::new("p.png"), options));
        let expected = "fps=10,scale=trunc(iw*0.5/2)*2:-1:flags=lanczos,palettegen";
        assert!(palette.iter().any(|a| a == expected));

        let gif = strings(gif_args(
            Path::new("in.mp4"),
            Path::new("p.png"),
            Path::new("o.gif"),
            options,
        ));
        assert!(gif.iter().any(|a| a.ends_with("[x];[x][1:v]paletteuse")));
    }

    #[test]
    fn test_overlay_and_volume_filters() {
        let overlay = strings(overlay_args(
            Path::new("v.mp4"),
            Path::new("logo.png"),
            10,
            -5,
            Path::new("o.mp4"),
        ));
        assert!(overlay.contains(&"[0:v][1:v]overlay=10:-5".to_string()));

        let volume = strings(volume_args(Path::new("a.mp3"), -3.5, Path::new("o.mp3")));
        assert!(volume.contains(&"volume=-3.5dB".to_string()));
    }

    #[test]
    fn test_layer_args_count_inputs() {
        let inputs = vec![PathBuf::from("a.wav"), PathBuf::from("b.wav"), PathBuf::from("c.wav")];
        let args = strings(layer_args(&inputs, Path::new("mix.wav")));
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);
        assert!(args.contains(&"amix=inputs=3:duration=longest:dropout_transition=2".to_string()));
    }

    #[tokio::test]
    async fn test_concatenate_missing_input_never_succeeds() {
        let temp_dir = TempDir::new().unwrap();
        let toolchain = MediaToolchain::new("ffmpeg", "ffprobe");
        let result = toolchain
            .concatenate(
                &[PathBuf::from("/nonexistent/one.mp4"), PathBuf::from("/nonexistent/two.mp4")],
                &temp_dir.path().join("out.mp4"),
                temp_dir.path(),
            )
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::DependencyMissing | ErrorKind::SubprocessFailed
        ));
    }
}
