use flatfs::OpenFlags;

use crate::shell::command::Command;

/// `c`, `t` and `a` in any order, e.g. `ct` for create + truncate.
fn parse_flags(raw: &str) -> Option<OpenFlags> {
    raw.chars().try_fold(OpenFlags::empty(), |flags, c| match c {
        'c' => Some(flags | OpenFlags::CREATE),
        't' => Some(flags | OpenFlags::TRUNCATE),
        'a' => Some(flags | OpenFlags::APPEND),
        _ => None,
    })
}

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls),
        "df" => Some(Command::Df),
        "open" => {
            let path = args.first()?.to_string();
            let flags = match args.get(1) {
                Some(raw) => parse_flags(raw)?,
                None => OpenFlags::empty(),
            };
            Some(Command::Open(path, flags))
        }
        "close" => args.first()?.parse().ok().map(Command::Close),
        "read" => {
            let fd = args.first()?.parse().ok()?;
            let len = args.get(1)?.parse().ok()?;
            Some(Command::Read(fd, len))
        }
        "write" => {
            if args.len() >= 2 {
                Some(Command::Write(args[0].parse().ok()?, args[1..].join(" ")))
            } else {
                None
            }
        }
        "lookup" => args.first().map(|&path| Command::Lookup(path.to_string())),
        "stat" => args.first().map(|&path| Command::Stat(path.to_string())),
        "cat" => args.first().map(|&path| Command::Cat(path.to_string())),
        "export" => {
            let source = args.first()?.to_string();
            let dest = args.get(1)?.to_string();
            Some(Command::Export(source, dest))
        }
        "exit" => Some(Command::Exit),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_open_flags() {
        match parse_command("open /notes ca") {
            Some(Command::Open(path, flags)) => {
                assert_eq!(path, "/notes");
                assert_eq!(flags, OpenFlags::CREATE | OpenFlags::APPEND);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_command("open /notes x").is_none());
        assert!(matches!(
            parse_command("open /notes"),
            Some(Command::Open(_, flags)) if flags.is_empty()
        ));
    }

    #[test]
    fn write_joins_words_with_single_spaces() {
        match parse_command("write 3 hello   big world") {
            Some(Command::Write(fd, text)) => {
                assert_eq!(fd, 3);
                assert_eq!(text, "hello big world");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(parse_command("write x hello").is_none());
        assert!(parse_command("read 1").is_none());
        assert!(parse_command("frobnicate").is_none());
    }
}
