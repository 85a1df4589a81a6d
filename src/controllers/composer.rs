use std::env;
use std::fs;
use std::process::Command;

use tracing::{debug, info};

use crate::error::FeedError;
use crate::models::{ApiClient, FormFields, ImageFile, MediaEdit, Post, Reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposerMode {
    CreatePost,
    EditPost(i64),
    /// Holds the parent post id.
    CreateReply(i64),
    EditReply(i64),
}

impl ComposerMode {
    pub fn is_edit(&self) -> bool {
        matches!(self, ComposerMode::EditPost(_) | ComposerMode::EditReply(_))
    }

    fn noun(&self) -> &'static str {
        match self {
            ComposerMode::CreatePost | ComposerMode::EditPost(_) => "Post",
            ComposerMode::CreateReply(_) | ComposerMode::EditReply(_) => "Reply",
        }
    }
}

/// What the composer would show as the attachment right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    None,
    /// A fresh local file; the URL appears once the preview upload finishes.
    NewImage { file_name: String, url: Option<String> },
    Image(String),
    Gif(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Submitted {
    Post(Post),
    Reply(Reply),
}

/// Shadow copy of a post or reply being written. Nothing here touches the
/// committed entity until `submit` succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct Composer {
    mode: ComposerMode,
    content: String,
    caret: Option<usize>,
    image: MediaEdit<ImageFile>,
    image_preview: Option<String>,
    persisted_image: Option<String>,
    gif: MediaEdit<String>,
    persisted_gif: Option<String>,
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_ref().map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
}

impl Composer {
    pub fn new(mode: ComposerMode) -> Self {
        Composer {
            mode,
            content: String::new(),
            caret: None,
            image: MediaEdit::Unchanged,
            image_preview: None,
            persisted_image: None,
            gif: MediaEdit::Unchanged,
            persisted_gif: None,
        }
    }

    fn editing(mode: ComposerMode, content: &str, image: &Option<String>, gif: &Option<String>) -> Self {
        let mut composer = Self::new(mode);
        composer.set_content(content);
        composer.persisted_image = non_blank(image);
        composer.persisted_gif = non_blank(gif);
        composer
    }

    pub fn edit_post(post: &Post) -> Self {
        Self::editing(ComposerMode::EditPost(post.id), &post.content, &post.image_url, &post.gif_url)
    }

    pub fn edit_reply(reply: &Reply) -> Self {
        Self::editing(ComposerMode::EditReply(reply.id), &reply.content, &reply.image_url, &reply.gif_url)
    }

    pub fn mode(&self) -> ComposerMode {
        self.mode
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn caret(&self) -> Option<usize> {
        self.caret
    }

    fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_offset(&self, char_idx: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_idx)
            .map(|(b, _)| b)
            .unwrap_or(self.content.len())
    }

    /// Replaces the text and parks the caret at the end.
    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
        self.caret = Some(self.char_len());
    }

    pub fn set_caret(&mut self, caret: Option<usize>) {
        self.caret = caret.map(|c| c.min(self.char_len()));
    }

    /// Inserts at the caret, or appends when there is none. The caret ends up
    /// just past the inserted text.
    pub fn insert_str(&mut self, text: &str) {
        let at = self.caret.unwrap_or_else(|| self.char_len()).min(self.char_len());
        let byte = self.byte_offset(at);
        self.content.insert_str(byte, text);
        self.caret = Some(at + text.chars().count());
    }

    pub fn insert_mention(&mut self, name: &str) {
        self.insert_str(&format!("@{} ", name));
    }

    pub fn insert_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.insert_str(c.encode_utf8(&mut buf));
    }

    pub fn backspace(&mut self) {
        let at = self.caret.unwrap_or_else(|| self.char_len());
        if at == 0 {
            return;
        }
        let start = self.byte_offset(at - 1);
        let end = self.byte_offset(at);
        self.content.replace_range(start..end, "");
        self.caret = Some(at - 1);
    }

    pub fn delete(&mut self) {
        let at = self.caret.unwrap_or_else(|| self.char_len());
        if at >= self.char_len() {
            return;
        }
        let start = self.byte_offset(at);
        let end = self.byte_offset(at + 1);
        self.content.replace_range(start..end, "");
    }

    pub fn caret_left(&mut self) {
        let at = self.caret.unwrap_or_else(|| self.char_len());
        self.caret = Some(at.saturating_sub(1));
    }

    pub fn caret_right(&mut self) {
        let at = self.caret.unwrap_or_else(|| self.char_len());
        self.caret = Some((at + 1).min(self.char_len()));
    }

    pub fn caret_home(&mut self) {
        self.caret = Some(0);
    }

    pub fn caret_end(&mut self) {
        self.caret = Some(self.char_len());
    }

    // media

    pub fn image_edit(&self) -> &MediaEdit<ImageFile> {
        &self.image
    }

    pub fn gif_edit(&self) -> &MediaEdit<String> {
        &self.gif
    }

    /// Picking an image drops any GIF.
    pub fn choose_image(&mut self, file: ImageFile) {
        debug!(file = %file.file_name, "image chosen");
        self.image = MediaEdit::Replace(file);
        self.image_preview = None;
        self.gif = if self.persisted_gif.is_some() { MediaEdit::Clear } else { MediaEdit::Unchanged };
    }

    /// Hosted URL from the preview upload; display only, never submitted.
    pub fn set_image_preview(&mut self, url: String) {
        if self.image.is_replace() {
            self.image_preview = Some(url);
        }
    }

    /// Picking a GIF drops any image.
    pub fn choose_gif(&mut self, url: &str) -> Result<(), FeedError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(FeedError::validation("GIF URL is empty"));
        }
        self.gif = MediaEdit::Replace(url.to_string());
        self.image = if self.persisted_image.is_some() { MediaEdit::Clear } else { MediaEdit::Unchanged };
        self.image_preview = None;
        Ok(())
    }

    /// Undoes a fresh pick locally, or marks a saved image for deletion.
    pub fn remove_image(&mut self) {
        match self.image {
            MediaEdit::Replace(_) => {
                self.image = MediaEdit::Unchanged;
                self.image_preview = None;
            }
            MediaEdit::Unchanged if self.persisted_image.is_some() => self.image = MediaEdit::Clear,
            _ => {}
        }
    }

    pub fn remove_gif(&mut self) {
        match self.gif {
            MediaEdit::Replace(_) => self.gif = MediaEdit::Unchanged,
            MediaEdit::Unchanged if self.persisted_gif.is_some() => self.gif = MediaEdit::Clear,
            _ => {}
        }
    }

    pub fn has_image(&self) -> bool {
        match self.image {
            MediaEdit::Replace(_) => true,
            MediaEdit::Clear => false,
            MediaEdit::Unchanged => self.persisted_image.is_some(),
        }
    }

    pub fn has_gif(&self) -> bool {
        match self.gif {
            MediaEdit::Replace(_) => true,
            MediaEdit::Clear => false,
            MediaEdit::Unchanged => self.persisted_gif.is_some(),
        }
    }

    pub fn preview(&self) -> Preview {
        match (&self.image, &self.gif) {
            (MediaEdit::Replace(file), _) => Preview::NewImage {
                file_name: file.file_name.clone(),
                url: self.image_preview.clone(),
            },
            (_, MediaEdit::Replace(url)) => Preview::Gif(url.clone()),
            _ => {
                if let (MediaEdit::Unchanged, Some(url)) = (&self.image, &self.persisted_image) {
                    Preview::Image(url.clone())
                } else if let (MediaEdit::Unchanged, Some(url)) = (&self.gif, &self.persisted_gif) {
                    Preview::Gif(url.clone())
                } else {
                    Preview::None
                }
            }
        }
    }

    /// Blank text is only an error when no attachment would remain.
    pub fn validate(&self) -> Result<(), FeedError> {
        if self.content.trim().is_empty() && !self.has_image() && !self.has_gif() {
            return Err(FeedError::validation(format!(
                "{} cannot be empty: add some content, an image, or a GIF",
                self.mode.noun()
            )));
        }
        Ok(())
    }

    /// Multipart body for the current mode.
    ///
    /// Edits send nothing for an untouched slot, `image`/`gif` for a
    /// replacement and `delete_image`/`delete_gif` = "true" to clear.
    pub fn build_form(&self) -> Result<FormFields, FeedError> {
        self.validate()?;
        let mut form = FormFields::new();
        if let ComposerMode::CreateReply(post_id) = self.mode {
            form = form.text("post_id", post_id.to_string());
        }
        form = form.text("content", self.content.clone());

        form = match &self.image {
            MediaEdit::Replace(file) => form.file("image", file.clone()),
            MediaEdit::Clear if self.mode.is_edit() => form.text("delete_image", "true"),
            _ => form,
        };
        form = match &self.gif {
            MediaEdit::Replace(url) => form.text("gif", url.clone()),
            MediaEdit::Clear if self.mode.is_edit() => form.text("delete_gif", "true"),
            _ => form,
        };
        Ok(form)
    }

    /// Uploads a freshly chosen image to get a preview URL.
    pub async fn upload_preview(&mut self, client: &ApiClient) -> Result<(), FeedError> {
        let file = match &self.image {
            MediaEdit::Replace(file) if self.image_preview.is_none() => file.clone(),
            _ => return Ok(()),
        };
        let url = client.upload(&file).await?;
        self.set_image_preview(url);
        Ok(())
    }

    pub async fn submit(&mut self, client: &ApiClient) -> Result<Submitted, FeedError> {
        let form = self.build_form()?;
        let submitted = match self.mode {
            ComposerMode::CreatePost => Submitted::Post(client.create_post(form).await?),
            ComposerMode::EditPost(id) => Submitted::Post(client.update_post(id, form).await?),
            ComposerMode::CreateReply(_) => Submitted::Reply(client.create_reply(form).await?),
            ComposerMode::EditReply(id) => Submitted::Reply(client.update_reply(id, form).await?),
        };
        info!(mode = ?self.mode, "composer submitted");
        self.reset();
        Ok(submitted)
    }

    /// Back to a blank composer for the same mode.
    pub fn reset(&mut self) {
        *self = Self::new(self.mode);
    }
}

/// Opens `$EDITOR` (default `vi`) on a temp file seeded with `initial`.
pub fn compose_in_editor(initial: &str) -> Result<String, FeedError> {
    let editor = env::var("EDITOR")
        .unwrap_or_else(|_| "vi".to_string());

    let mut temp_path = env::temp_dir();
    temp_path.push(format!("feedtui-{}.txt", std::process::id()));
    fs::write(&temp_path, initial)?;

    let status = Command::new(editor)
        .arg(&temp_path)
        .status()?;

    if !status.success() {
        let _ = fs::remove_file(&temp_path);
        return Err(FeedError::Io("Editor exited with non-zero status".to_string()));
    }

    let content = fs::read_to_string(&temp_path)?;
    let _ = fs::remove_file(&temp_path);
    Ok(content.trim_end_matches('\n').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::media::FormValue;

    fn png() -> ImageFile {
        ImageFile::from_bytes("pic.png", vec![1, 2, 3])
    }

    fn saved_post(image: Option<&str>, gif: Option<&str>) -> Post {
        Post {
            id: 42,
            content: "hello".into(),
            image_url: image.map(str::to_string),
            gif_url: gif.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn empty_submission_is_rejected() {
        let composer = Composer::new(ComposerMode::CreatePost);
        assert!(matches!(composer.validate(), Err(FeedError::Validation(_))));
        assert!(composer.build_form().is_err());

        let mut spaces = Composer::new(ComposerMode::CreateReply(1));
        spaces.set_content("   \n");
        assert!(spaces.validate().is_err());
    }

    #[test]
    fn attachment_alone_is_enough() {
        let mut composer = Composer::new(ComposerMode::CreatePost);
        composer.choose_image(png());
        assert!(composer.validate().is_ok());

        let mut composer = Composer::new(ComposerMode::CreatePost);
        composer.choose_gif("https://media.example/a.gif").unwrap();
        assert!(composer.validate().is_ok());
    }

    #[test]
    fn image_and_gif_are_mutually_exclusive() {
        let mut composer = Composer::new(ComposerMode::CreatePost);
        composer.choose_gif("https://media.example/a.gif").unwrap();
        composer.choose_image(png());
        assert!(!composer.has_gif());
        assert!(composer.gif_edit().replacement().is_none());

        composer.choose_gif("https://media.example/b.gif").unwrap();
        assert!(!composer.has_image());
        assert!(composer.image_edit().replacement().is_none());
        assert_eq!(composer.preview(), Preview::Gif("https://media.example/b.gif".into()));
    }

    #[test]
    fn deleting_saved_image_sends_flag_without_file() {
        let mut composer = Composer::edit_post(&saved_post(Some("https://img/1.png"), None));
        assert_eq!(composer.preview(), Preview::Image("https://img/1.png".into()));
        composer.remove_image();
        assert_eq!(composer.preview(), Preview::None);

        let form = composer.build_form().unwrap();
        assert_eq!(form.text_value("delete_image"), Some("true"));
        assert!(!form.has("image"));
        assert!(!form.has("delete_gif"));
        assert!(!form.has("gif"));
    }

    #[test]
    fn untouched_slots_are_absent() {
        let composer = Composer::edit_post(&saved_post(Some("https://img/1.png"), None));
        let form = composer.build_form().unwrap();
        assert_eq!(form.names(), vec!["content"]);
    }

    #[test]
    fn removing_fresh_file_is_local_undo() {
        let mut composer = Composer::edit_post(&saved_post(Some("https://img/1.png"), None));
        composer.choose_image(png());
        composer.set_image_preview("https://cdn/preview.png".into());
        composer.remove_image();
        assert_eq!(composer.image_edit(), &MediaEdit::Unchanged);
        assert_eq!(composer.preview(), Preview::Image("https://img/1.png".into()));
        assert_eq!(composer.build_form().unwrap().names(), vec!["content"]);
    }

    #[test]
    fn replacing_saved_gif_with_image() {
        let mut composer = Composer::edit_post(&saved_post(None, Some("https://media/old.gif")));
        composer.choose_image(png());
        let form = composer.build_form().unwrap();
        assert!(matches!(form.get("image"), Some(FormValue::File(f)) if f.file_name == "pic.png"));
        assert_eq!(form.text_value("delete_gif"), Some("true"));
        assert!(!form.has("gif"));
    }

    #[test]
    fn create_reply_form_carries_post_id() {
        let mut composer = Composer::new(ComposerMode::CreateReply(7));
        composer.set_content("nice");
        composer.choose_gif("https://media/x.gif").unwrap();
        composer.remove_image();
        let form = composer.build_form().unwrap();
        assert_eq!(form.names(), vec!["post_id", "content", "gif"]);
        assert_eq!(form.text_value("post_id"), Some("7"));
    }

    #[test]
    fn mention_inserts_at_caret() {
        let mut composer = Composer::new(ComposerMode::CreatePost);
        composer.set_content("hi there");
        composer.set_caret(Some(3));
        composer.insert_mention("ana");
        assert_eq!(composer.content(), "hi @ana there");
        assert_eq!(composer.caret(), Some(8));
    }

    #[test]
    fn mention_without_caret_appends() {
        let mut composer = Composer::new(ComposerMode::CreatePost);
        composer.set_content("hello ");
        composer.set_caret(None);
        composer.insert_mention("bo");
        assert_eq!(composer.content(), "hello @bo ");
        assert_eq!(composer.caret(), Some(10));
    }

    #[test]
    fn editing_keys_handle_multibyte_text() {
        let mut composer = Composer::new(ComposerMode::CreatePost);
        composer.set_content("héllo");
        composer.caret_left();
        composer.backspace();
        assert_eq!(composer.content(), "hélo");
        composer.caret_home();
        composer.delete();
        assert_eq!(composer.content(), "élo");
        composer.caret_right();
        composer.insert_char('ü');
        assert_eq!(composer.content(), "éülo");
        composer.caret_end();
        composer.insert_char('!');
        assert_eq!(composer.content(), "éülo!");
    }

    #[test]
    fn blank_gif_url_is_refused() {
        let mut composer = Composer::new(ComposerMode::CreatePost);
        assert!(composer.choose_gif("  ").is_err());
        assert_eq!(composer.gif_edit(), &MediaEdit::Unchanged);
    }
}
