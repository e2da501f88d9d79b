#![allow(clippy::module_name_repetitions)]

//! Lexer and parser for the emulator console.
//!
//! Lines are tokenised with `regal` into a bounded buffer, then parsed with
//! `winnow` combinators running directly over the token slice.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec as HeaplessVec;
use hostctl_core::protocol::{CommandCode, ValueMode};
use regal::IncrementalError;
use regal::TokenCache;
use regal_macros::RegalLexer;
use winnow::ModalResult;
use winnow::combinator::{alt, opt, repeat};
use winnow::error::{ContextError, ErrMode, StrContext};
use winnow::prelude::*;
use winnow::token::any;

/// Maximum number of tokens accepted per console line.
pub const MAX_TOKENS: usize = 48;
const MAX_CACHE_RECORDS: usize = MAX_TOKENS * 2;

/// Longest span a single `advance` may cover.
pub const MAX_ADVANCE: Duration = Duration::from_secs(3_600);
/// Most ticks a single `tick <n>` may run.
pub const MAX_TICKS: u32 = 3_600;

/// Console commands with their one-line usage, in help order.
pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("write", "write <byte>...                   - send raw bytes as one write phase"),
    (
        "send",
        "send <command> [ch] [value] [ascii] - encode and send a packet (led: value is the mode)",
    ),
    ("read", "read                              - run a read phase and decode the reply"),
    ("tick", "tick [n]                          - advance the clock by n ticks (n <= 3600)"),
    ("advance", "advance <duration>                - advance the clock up to 1h, e.g. 3s"),
    ("press", "press                             - press and release the manual switch"),
    ("analog", "analog <ch> <level>               - set an analog input level (0.0-1.0)"),
    ("digital", "digital <ch> <0|1>                - drive a digital line from outside"),
    ("status", "status                            - show device and board state"),
    ("help", "help [topic]                      - show help for a command"),
];

/// Lexical token kinds recognised by the console.
#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Hexadecimal literal with a `0x` prefix.
    #[regex(r"0[xX][0-9A-Fa-f]+", priority = 3)]
    Hex,
    /// Duration literal ending in `ms` or `s`.
    #[regex(r"[0-9]+(?:ms|s)", priority = 2)]
    Duration,
    /// Fractional literal.
    #[regex(r"[0-9]+\.[0-9]+", priority = 2)]
    Decimal,
    /// Optionally signed integer literal.
    #[regex(r"-?[0-9]+")]
    Integer,
    /// Keyword or command name (case-insensitive match performed later).
    #[regex(r"[A-Za-z][A-Za-z0-9-]*")]
    Ident,
    #[regex(r"[ \t]+", skip)]
    Whitespace,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Eol,
    /// Pseudo variant used when the lexer encounters unsupported input.
    #[default]
    #[regex(r".", priority = 1024)]
    Error,
}

/// Token with a byte span back into the source line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub lexeme: &'a str,
    pub span: Range<usize>,
}

pub type TokenBuffer<'a> = HeaplessVec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LexError {
    /// Input produced more tokens than the buffer allows.
    TooManyTokens { processed: usize },
    /// Underlying lexer reported an unrecoverable error.
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::TooManyTokens { processed } => {
                write!(f, "token buffer exhausted after {processed} items")
            }
            LexError::Engine => write!(f, "lexer engine error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GrammarError<'a> {
    UnexpectedToken {
        expected: &'static str,
        found: &'a str,
        span: Range<usize>,
    },
    UnexpectedEnd {
        expected: &'static str,
    },
    UnknownCommand {
        name: &'a str,
    },
    InvalidToken {
        lexeme: &'a str,
        span: Range<usize>,
    },
}

impl<'a> GrammarError<'a> {
    fn unexpected(expected: &'static str, token: Option<&Token<'a>>) -> Self {
        match token {
            Some(token) => GrammarError::UnexpectedToken {
                expected,
                found: token.lexeme,
                span: token.span.clone(),
            },
            None => GrammarError::UnexpectedEnd { expected },
        }
    }
}

impl fmt::Display for GrammarError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrammarError::UnexpectedToken {
                expected,
                found,
                span,
            } => write!(f, "expected {expected}, found `{found}` at {span:?}"),
            GrammarError::UnexpectedEnd { expected } => {
                write!(f, "unexpected end of input, expected {expected}")
            }
            GrammarError::UnknownCommand { name } => write!(f, "unknown command `{name}`"),
            GrammarError::InvalidToken { lexeme, span } => {
                write!(f, "unsupported token `{lexeme}` at {span:?}")
            }
        }
    }
}

/// Combined lex/parse error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Grammar(GrammarError<'a>),
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Grammar(err) => err.fmt(f),
        }
    }
}

/// Packet request assembled by `send`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SendCommand {
    pub command: u8,
    pub channel: u8,
    pub value: i32,
    pub mode: ValueMode,
}

/// Parsed console command.
#[derive(Clone, Debug, PartialEq)]
pub enum ConsoleCommand {
    Write(Vec<u8>),
    Send(SendCommand),
    Read,
    Tick(u32),
    Advance(Duration),
    Press,
    Analog { channel: u8, level: f32 },
    Digital { channel: u8, level: bool },
    Status,
    Help(Option<String>),
}

/// Tokenises `line`.
pub fn lex(line: &str) -> Result<TokenBuffer<'_>, LexError> {
    let compiled = TokenKind::lexer();
    let mut cache: TokenCache<TokenKind, MAX_CACHE_RECORDS> = TokenCache::new();
    let partial = cache
        .rebuild(compiled, line)
        .map_err(map_incremental_error)?;
    let mut buffer = TokenBuffer::new();

    for record in cache.tokens() {
        if record.skipped {
            continue;
        }

        let span = record.start..record.end;
        let lexeme = &line[span.clone()];
        push_token(&mut buffer, record.token, lexeme, span)?;
    }

    if let Some(partial) = partial.filter(|partial| !partial.fragment.is_empty()) {
        let start = partial.start;
        let span = start..start + partial.fragment.len();
        push_token(&mut buffer, TokenKind::Error, partial.fragment, span)?;
    }

    Ok(buffer)
}

fn push_token<'a>(
    buffer: &mut TokenBuffer<'a>,
    kind: TokenKind,
    lexeme: &'a str,
    span: Range<usize>,
) -> Result<(), LexError> {
    buffer
        .push(Token { kind, lexeme, span })
        .map_err(|_| LexError::TooManyTokens {
            processed: buffer.len() + 1,
        })
}

fn map_incremental_error(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::TooManyTokens {
            processed: MAX_TOKENS,
        },
        _ => LexError::Engine,
    }
}

/// Parses one console line.
pub fn parse(line: &str) -> Result<ConsoleCommand, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;

    if let Some(token) = tokens.iter().find(|token| token.kind == TokenKind::Error) {
        return Err(ParseError::Grammar(GrammarError::InvalidToken {
            lexeme: token.lexeme,
            span: token.span.clone(),
        }));
    }

    let significant: TokenBuffer<'_> = tokens
        .iter()
        .filter(|token| token.kind != TokenKind::Eol)
        .cloned()
        .collect();

    let Some((keyword, arguments)) = significant.split_first() else {
        return Err(ParseError::Grammar(GrammarError::unexpected("command", None)));
    };
    if keyword.kind != TokenKind::Ident {
        return Err(ParseError::Grammar(GrammarError::unexpected(
            "command",
            Some(keyword),
        )));
    }

    let mut input = arguments;
    let parsed = arguments_for(keyword.lexeme)
        .ok_or(GrammarError::UnknownCommand {
            name: keyword.lexeme,
        })
        .map_err(ParseError::Grammar)?
        .parse_next(&mut input);

    match parsed {
        Ok(command) => match input.first() {
            None => Ok(command),
            Some(extra) => Err(ParseError::Grammar(GrammarError::unexpected(
                "end of command",
                Some(extra),
            ))),
        },
        Err(ErrMode::Backtrack(error) | ErrMode::Cut(error)) => {
            Err(ParseError::Grammar(grammar_error(&error, input.first())))
        }
        Err(ErrMode::Incomplete(_)) => Err(ParseError::Grammar(GrammarError::unexpected(
            "argument",
            input.first(),
        ))),
    }
}

fn grammar_error<'a>(error: &ContextError, found: Option<&Token<'a>>) -> GrammarError<'a> {
    // Labels accumulate innermost first; report the outermost one.
    let expected = error
        .context()
        .filter_map(|context| match context {
            StrContext::Label(label) => Some(*label),
            _ => None,
        })
        .last()
        .unwrap_or("argument");
    GrammarError::unexpected(expected, found)
}

type Tokens<'i, 'a> = &'i [Token<'a>];
type ArgumentParser = for<'i, 'a> fn(&mut Tokens<'i, 'a>) -> ModalResult<ConsoleCommand>;

fn arguments_for(keyword: &str) -> Option<ArgumentParser> {
    let table: [(&str, ArgumentParser); 10] = [
        ("write", write_args),
        ("send", send_args),
        ("read", |_| Ok(ConsoleCommand::Read)),
        ("tick", tick_args),
        ("advance", advance_args),
        ("press", |_| Ok(ConsoleCommand::Press)),
        ("analog", analog_args),
        ("digital", digital_args),
        ("status", |_| Ok(ConsoleCommand::Status)),
        ("help", help_args),
    ];
    table
        .into_iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(keyword))
        .map(|(_, parser)| parser)
}

fn write_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    repeat(0.., byte)
        .map(ConsoleCommand::Write)
        .parse_next(input)
}

fn send_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    (command_code, opt(channel), opt(value), opt(value_mode))
        .map(|(command, channel, value, mode)| {
            ConsoleCommand::Send(SendCommand {
                command,
                channel: channel.unwrap_or(0),
                value: value.unwrap_or(0),
                mode: mode.unwrap_or(ValueMode::Binary),
            })
        })
        .parse_next(input)
}

fn tick_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    opt(integer
        .verify_map(|value| {
            u32::try_from(value)
                .ok()
                .filter(|count| (1..=MAX_TICKS).contains(count))
        })
        .context(StrContext::Label("tick count up to 3600")))
    .map(|count| ConsoleCommand::Tick(count.unwrap_or(1)))
    .parse_next(input)
}

fn advance_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    duration.map(ConsoleCommand::Advance).parse_next(input)
}

fn analog_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    (channel, level)
        .map(|(channel, level)| ConsoleCommand::Analog { channel, level })
        .parse_next(input)
}

fn digital_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    (
        channel,
        integer
            .verify_map(|value| match value {
                0 => Some(false),
                1 => Some(true),
                _ => None,
            })
            .context(StrContext::Label("0 or 1")),
    )
        .map(|(channel, level)| ConsoleCommand::Digital { channel, level })
        .parse_next(input)
}

fn help_args(input: &mut Tokens<'_, '_>) -> ModalResult<ConsoleCommand> {
    opt(any.verify_map(|token: Token<'_>| {
        (token.kind == TokenKind::Ident).then(|| token.lexeme.to_owned())
    }))
    .map(ConsoleCommand::Help)
    .parse_next(input)
}

fn integer(input: &mut Tokens<'_, '_>) -> ModalResult<i64> {
    any.verify_map(|token: Token<'_>| match token.kind {
        TokenKind::Integer => token.lexeme.parse().ok(),
        TokenKind::Hex => i64::from_str_radix(&token.lexeme[2..], 16).ok(),
        _ => None,
    })
    .context(StrContext::Label("integer"))
    .parse_next(input)
}

fn byte(input: &mut Tokens<'_, '_>) -> ModalResult<u8> {
    integer
        .verify_map(|value| u8::try_from(value).ok())
        .context(StrContext::Label("byte"))
        .parse_next(input)
}

fn channel(input: &mut Tokens<'_, '_>) -> ModalResult<u8> {
    integer
        .verify_map(|value| u8::try_from(value).ok())
        .context(StrContext::Label("channel"))
        .parse_next(input)
}

fn value(input: &mut Tokens<'_, '_>) -> ModalResult<i32> {
    integer
        .verify_map(|value| i32::try_from(value).ok())
        .context(StrContext::Label("value"))
        .parse_next(input)
}

fn command_code(input: &mut Tokens<'_, '_>) -> ModalResult<u8> {
    alt((
        any.verify_map(|token: Token<'_>| {
            (token.kind == TokenKind::Ident)
                .then(|| CommandCode::from_name(token.lexeme))
                .flatten()
                .map(CommandCode::to_raw)
        }),
        byte,
    ))
    .context(StrContext::Label("command name or code"))
    .parse_next(input)
}

fn value_mode(input: &mut Tokens<'_, '_>) -> ModalResult<ValueMode> {
    any.verify_map(|token: Token<'_>| {
        if token.kind != TokenKind::Ident {
            None
        } else if token.lexeme.eq_ignore_ascii_case("ascii") {
            Some(ValueMode::Ascii)
        } else if token.lexeme.eq_ignore_ascii_case("binary") {
            Some(ValueMode::Binary)
        } else {
            None
        }
    })
    .context(StrContext::Label("ascii or binary"))
    .parse_next(input)
}

fn level(input: &mut Tokens<'_, '_>) -> ModalResult<f32> {
    any.verify_map(|token: Token<'_>| match token.kind {
        TokenKind::Decimal | TokenKind::Integer => token
            .lexeme
            .parse::<f32>()
            .ok()
            .filter(|level| (0.0..=1.0).contains(level)),
        _ => None,
    })
    .context(StrContext::Label("level between 0.0 and 1.0"))
    .parse_next(input)
}

fn duration(input: &mut Tokens<'_, '_>) -> ModalResult<Duration> {
    any.verify_map(|token: Token<'_>| {
        if token.kind != TokenKind::Duration {
            return None;
        }
        let duration = if let Some(millis) = token.lexeme.strip_suffix("ms") {
            millis.parse().ok().map(Duration::from_millis)
        } else {
            let seconds = token.lexeme.strip_suffix('s')?;
            seconds.parse().ok().map(Duration::from_secs)
        };
        duration.filter(|duration| *duration <= MAX_ADVANCE)
    })
    .context(StrContext::Label("duration up to 1h"))
    .parse_next(input)
}
