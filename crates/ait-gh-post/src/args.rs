/// Where `gh` was given the title/body, and the other flags the wrapper cares about.
///
/// `title_index`/`body_index` point at the argument holding the text. For the
/// inline `--title=...` form that argument is the flag itself and the text is
/// also copied into `title_value`/`body_value`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GhArgs {
    pub command: String,
    pub subcommand: String,
    pub title_index: Option<usize>,
    pub body_index: Option<usize>,
    pub title_value: Option<String>,
    pub body_value: Option<String>,
    pub repo: Option<String>,
    pub labels: Vec<String>,
}

impl GhArgs {
    pub fn has_label(&self, label: &str) -> bool {
        self.labels
            .iter()
            .flat_map(|value| value.split(','))
            .any(|value| value.trim() == label)
    }

    pub fn has_mail_label(&self) -> bool {
        self.has_label("mail")
    }
}

enum Slot {
    Title,
    Body,
    Repo,
    Label,
}

fn flag_slot(flag: &str) -> Option<Slot> {
    match flag {
        "--title" | "-t" => Some(Slot::Title),
        "--body" | "-b" => Some(Slot::Body),
        "--repo" | "-R" => Some(Slot::Repo),
        "--label" | "-l" => Some(Slot::Label),
        _ => None,
    }
}

pub fn parse_gh_args(args: &[String]) -> GhArgs {
    let mut parsed = GhArgs {
        command: args.first().cloned().unwrap_or_default(),
        subcommand: args.get(1).cloned().unwrap_or_default(),
        ..GhArgs::default()
    };

    let mut idx = 2;
    while idx < args.len() {
        let arg = args[idx].as_str();
        let inline = arg.split_once('=').filter(|(flag, _)| flag.starts_with("--"));
        if let Some((flag, value)) = inline {
            match flag_slot(flag) {
                Some(Slot::Title) => {
                    parsed.title_index = Some(idx);
                    parsed.title_value = Some(value.to_string());
                }
                Some(Slot::Body) => {
                    parsed.body_index = Some(idx);
                    parsed.body_value = Some(value.to_string());
                }
                Some(Slot::Repo) => parsed.repo = Some(value.to_string()),
                Some(Slot::Label) => parsed.labels.push(value.to_string()),
                None => {}
            }
            idx += 1;
            continue;
        }

        let Some(slot) = flag_slot(arg) else {
            idx += 1;
            continue;
        };
        let value_idx = idx + 1;
        let Some(value) = args.get(value_idx) else {
            break;
        };
        match slot {
            Slot::Title => parsed.title_index = Some(value_idx),
            Slot::Body => parsed.body_index = Some(value_idx),
            Slot::Repo => parsed.repo = Some(value.clone()),
            Slot::Label => parsed.labels.push(value.clone()),
        }
        idx += 2;
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> GhArgs {
        let owned: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        parse_gh_args(&owned)
    }

    #[test]
    fn finds_title_and_body_positions() {
        let create = parse(&["issue", "create", "--title", "My Title", "--body", "My Body"]);
        assert_eq!(create.command, "issue");
        assert_eq!(create.subcommand, "create");
        assert_eq!(create.title_index, Some(3));
        assert_eq!(create.body_index, Some(5));

        let comment = parse(&["issue", "comment", "42", "--body", "Comment text"]);
        assert_eq!(comment.subcommand, "comment");
        assert_eq!(comment.body_index, Some(4));
        assert_eq!(comment.title_index, None);

        let short = parse(&["issue", "create", "-t", "Title", "-b", "Body"]);
        assert_eq!(short.title_index, Some(3));
        assert_eq!(short.body_index, Some(5));
    }

    #[test]
    fn reads_repo_in_every_form() {
        for args in [
            vec!["issue", "create", "--repo", "owner/repo", "--title", "T"],
            vec!["issue", "create", "-R", "owner/repo", "-t", "T", "-b", "B"],
            vec!["issue", "create", "--repo=owner/repo"],
        ] {
            assert_eq!(parse(&args).repo.as_deref(), Some("owner/repo"), "{args:?}");
        }

        let mixed = parse(&["issue", "create", "--title", "T", "-b", "Body", "-R", "owner/repo"]);
        assert_eq!(mixed.title_index, Some(3));
        assert_eq!(mixed.body_index, Some(5));
        assert_eq!(mixed.repo.as_deref(), Some("owner/repo"));
    }

    #[test]
    fn inline_values() {
        let parsed = parse(&["issue", "create", "--title=My Title", "--body=My body content"]);
        assert_eq!(parsed.title_value.as_deref(), Some("My Title"));
        assert_eq!(parsed.title_index, Some(2));
        assert_eq!(parsed.body_value.as_deref(), Some("My body content"));
        assert_eq!(parsed.body_index, Some(3));
    }

    #[test]
    fn detects_mail_label() {
        assert!(parse(&["issue", "create", "--label", "mail", "--title", "T"]).has_mail_label());
        assert!(!parse(&["issue", "create", "--label", "bug", "--title", "T"]).has_mail_label());
        assert!(parse(&["issue", "create", "--label", "P1", "--label", "mail"]).has_mail_label());
        assert!(parse(&["issue", "create", "-l", "mail", "-t", "T"]).has_mail_label());
        assert!(parse(&["issue", "create", "--label=mail"]).has_mail_label());
        assert!(parse(&["issue", "create", "--label", "bug,mail"]).has_mail_label());
    }

    #[test]
    fn short_argument_lists() {
        let empty = parse(&[]);
        assert_eq!(empty.command, "");
        assert_eq!(empty.subcommand, "");

        let single = parse(&["issue"]);
        assert_eq!(single.command, "issue");
        assert_eq!(single.subcommand, "");

        let dangling = parse(&["issue", "create", "--title"]);
        assert_eq!(dangling.title_index, None);
    }
}
