//! Prompt expansion
//!
//! Backslash escapes of PS1, PS2, PS4 and `${var@P}`. The caller expands
//! `$` substitutions itself and only passes literal text through here.

use chrono::{DateTime, Local};
use chrono::format::{Item, StrftimeItems};

/// What prompt escapes can refer to.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    pub user: String,
    pub hostname: String,
    pub pwd: String,
    pub home: String,
    pub is_root: bool,
    pub job_count: usize,
    pub command_number: usize,
    pub shell_name: String,
}

impl PromptContext {
    /// `\w`: the working directory with `$HOME` shortened to `~`.
    fn tilde_pwd(&self) -> String {
        if !self.home.is_empty() && self.home != "/" {
            if let Some(rest) = self.pwd.strip_prefix(&self.home) {
                if rest.is_empty() || rest.starts_with('/') {
                    return format!("~{}", rest);
                }
            }
        }
        self.pwd.clone()
    }

    fn pwd_basename(&self) -> String {
        if self.pwd == "/" {
            return "/".to_string();
        }
        if !self.home.is_empty() && self.pwd == self.home {
            return "~".to_string();
        }
        self.pwd.rsplit('/').next().unwrap_or(&self.pwd).to_string()
    }
}

/// `\D{format}`. An invalid format is copied literally.
fn strftime(format: &str, now: &DateTime<Local>) -> String {
    let format = if format.is_empty() { "%X" } else { format };
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return format.to_string();
    }
    now.format(format).to_string()
}

/// Expand the backslash escapes of a prompt string.
///
/// - `\a \e \n \r \\` and `\NNN` octal
/// - `\$` is `#` for root, `$` otherwise
/// - `\[` and `\]` are dropped
/// - `\u \h \H \w \W \s \j \# \!`
/// - `\d \t \T \@ \A \D{fmt}`
pub fn expand_prompt(ctx: &PromptContext, value: &str) -> String {
    let mut result = String::new();
    let chars: Vec<char> = value.chars().collect();
    let now = Local::now();
    let short_host = ctx.hostname.split('.').next().unwrap_or(&ctx.hostname);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' || i + 1 >= chars.len() {
            result.push(c);
            i += 1;
            continue;
        }
        let next = chars[i + 1];
        i += 2;

        if ('0'..='7').contains(&next) {
            let start = i - 1;
            let digits: String = chars[start..].iter().take(3).take_while(|c| ('0'..='7').contains(c)).collect();
            i = start + digits.len();
            let code = u32::from_str_radix(&digits, 8).unwrap_or(0) % 256;
            if let Some(ch) = char::from_u32(code) {
                result.push(ch);
            }
            continue;
        }

        match next {
            '\\' => result.push('\\'),
            'a' => result.push('\x07'),
            'e' => result.push('\x1b'),
            'n' => result.push('\n'),
            'r' => result.push('\r'),
            '$' => result.push(if ctx.is_root { '#' } else { '$' }),
            '[' | ']' => {}
            'u' => result.push_str(&ctx.user),
            'h' => result.push_str(short_host),
            'H' => result.push_str(&ctx.hostname),
            'w' => result.push_str(&ctx.tilde_pwd()),
            'W' => result.push_str(&ctx.pwd_basename()),
            's' => result.push_str(&ctx.shell_name),
            'j' => result.push_str(&ctx.job_count.to_string()),
            '#' | '!' => result.push_str(&ctx.command_number.to_string()),
            'd' => result.push_str(&now.format("%a %b %e").to_string()),
            't' => result.push_str(&now.format("%H:%M:%S").to_string()),
            'T' => result.push_str(&now.format("%I:%M:%S").to_string()),
            '@' => result.push_str(&now.format("%I:%M %p").to_string()),
            'A' => result.push_str(&now.format("%H:%M").to_string()),
            'D' if chars.get(i) == Some(&'{') => {
                let rest = &chars[i + 1..];
                match rest.iter().position(|c| *c == '}') {
                    Some(close) => {
                        let format: String = rest[..close].iter().collect();
                        result.push_str(&strftime(&format, &now));
                        i += close + 2;
                    }
                    None => result.push_str("\\D"),
                }
            }
            _ => {
                result.push('\\');
                result.push(next);
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_ctx() -> PromptContext {
        PromptContext {
            user: "testuser".to_string(),
            hostname: "myhost.example.com".to_string(),
            pwd: "/home/testuser/projects".to_string(),
            home: "/home/testuser".to_string(),
            is_root: false,
            job_count: 2,
            command_number: 7,
            shell_name: "oshell".to_string(),
        }
    }

    #[test]
    fn test_simple_escapes() {
        let ctx = make_ctx();
        assert_eq!(expand_prompt(&ctx, "\\n"), "\n");
        assert_eq!(expand_prompt(&ctx, "\\\\"), "\\");
        assert_eq!(expand_prompt(&ctx, "\\$ "), "$ ");
        assert_eq!(expand_prompt(&ctx, "+ "), "+ ");
    }

    #[test]
    fn test_root_prompt() {
        let ctx = PromptContext {
            is_root: true,
            ..make_ctx()
        };
        assert_eq!(expand_prompt(&ctx, "\\$"), "#");
    }

    #[test]
    fn test_user_host_and_dir() {
        let ctx = make_ctx();
        assert_eq!(expand_prompt(&ctx, "\\u@\\h"), "testuser@myhost");
        assert_eq!(expand_prompt(&ctx, "\\H"), "myhost.example.com");
        assert_eq!(expand_prompt(&ctx, "\\w"), "~/projects");
        assert_eq!(expand_prompt(&ctx, "\\W"), "projects");
    }

    #[test]
    fn test_counters() {
        let ctx = make_ctx();
        assert_eq!(expand_prompt(&ctx, "\\j \\#"), "2 7");
        assert_eq!(expand_prompt(&ctx, "\\s"), "oshell");
    }

    #[test]
    fn test_octal_and_brackets() {
        let ctx = make_ctx();
        assert_eq!(expand_prompt(&ctx, "\\101"), "A");
        assert_eq!(expand_prompt(&ctx, "\\[\\e[32m\\]x"), "\x1b[32mx");
    }

    #[test]
    fn test_date_format() {
        let ctx = make_ctx();
        assert_eq!(expand_prompt(&ctx, "\\D{%%}"), "%");
        assert_eq!(expand_prompt(&ctx, "\\D{abc"), "\\D{abc");
        assert_eq!(expand_prompt(&ctx, "\\A").len(), 5);
    }
}
