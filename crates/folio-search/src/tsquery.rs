//! Free text to `to_tsquery` conversion.
//!
//! Users type search-box text; `to_tsquery` wants operator syntax and raises
//! on anything malformed. The converter accepts any input and always returns
//! either a well-formed query or the empty string:
//!
//! | Input                | Output                  |
//! |----------------------|-------------------------|
//! | `hello world`        | `hello & world`         |
//! | `cats or dogs`       | `cats \| dogs`          |
//! | `-spam eggs`         | `!spam & eggs`          |
//! | `prog*`              | `prog:*`                |
//! | `"quick fox"`        | `quick <-> fox`         |
//! | `(a \| b) c`         | `(a \| b) & c`          |
//!
//! Only alphanumeric runs become words; every other character is either an
//! operator or a separator, so no user text can inject tsquery syntax.

use folio_core::TermParser;

/// Which operators the converter recognizes. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionOptions {
    /// `|`, `,` and the keyword `or` mean OR.
    pub or: bool,
    /// Leading `-` or `!` negates.
    pub negation: bool,
    /// Trailing `*` requests a prefix match.
    pub prefix: bool,
    /// Double quotes group words into a phrase.
    pub phrase: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            or: true,
            negation: true,
            prefix: true,
            phrase: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word { text: String, prefix: bool },
    Phrase(Vec<String>),
    And,
    Or,
    Not,
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Term { text: String, prefix: bool },
    Phrase(Vec<String>),
    Not(Box<Node>),
    And(Vec<Node>),
    Or(Vec<Node>),
}

impl Node {
    fn precedence(&self) -> u8 {
        match self {
            Node::Or(_) => 1,
            Node::And(_) => 2,
            Node::Phrase(_) => 3,
            Node::Not(_) => 4,
            Node::Term { .. } => 5,
        }
    }

    fn render(&self) -> String {
        match self {
            Node::Term { text, prefix } => {
                if *prefix {
                    format!("{}:*", text)
                } else {
                    text.clone()
                }
            }
            Node::Phrase(words) => words.join(" <-> "),
            Node::Not(inner) => format!("!{}", inner.render_within(4)),
            Node::And(children) => Self::join(children, " & ", 2),
            Node::Or(children) => Self::join(children, " | ", 1),
        }
    }

    fn render_within(&self, min_precedence: u8) -> String {
        if self.precedence() < min_precedence {
            format!("({})", self.render())
        } else {
            self.render()
        }
    }

    fn join(children: &[Node], separator: &str, min_precedence: u8) -> String {
        children
            .iter()
            .map(|child| child.render_within(min_precedence))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Combine operands, flattening nested groups of the same operator.
    fn combine(nodes: Vec<Node>, or: bool) -> Option<Node> {
        let mut flat = Vec::with_capacity(nodes.len());
        for node in nodes {
            match (node, or) {
                (Node::Or(inner), true) | (Node::And(inner), false) => flat.extend(inner),
                (other, _) => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ if or => Some(Node::Or(flat)),
            _ => Some(Node::And(flat)),
        }
    }
}

/// Converts search-box text into `to_tsquery` syntax.
#[derive(Debug, Clone, Default)]
pub struct TsQueryConverter {
    options: ConversionOptions,
}

impl TsQueryConverter {
    pub fn new(options: ConversionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> ConversionOptions {
        self.options
    }

    /// Convert `raw`; returns an empty string when it contains no words.
    pub fn convert(&self, raw: &str) -> String {
        let tokens = self.tokenize(raw);
        Parser::new(&tokens)
            .parse()
            .map(|node| node.render())
            .unwrap_or_default()
    }

    fn tokenize(&self, raw: &str) -> Vec<Token> {
        let chars: Vec<char> = raw.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            if c.is_alphanumeric() {
                let start = i;
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let prefix = self.options.prefix && chars.get(i) == Some(&'*');
                if prefix {
                    i += 1;
                }
                tokens.push(self.keyword(&text, prefix).unwrap_or(Token::Word { text, prefix }));
                continue;
            }

            match c {
                '&' | '+' => tokens.push(Token::And),
                '|' | ',' if self.options.or => tokens.push(Token::Or),
                '!' if self.options.negation => tokens.push(Token::Not),
                '-' if self.options.negation && starts_operand(&chars, i) => {
                    tokens.push(Token::Not)
                }
                '(' => tokens.push(Token::Open),
                ')' => tokens.push(Token::Close),
                '"' if self.options.phrase => {
                    let end = chars[i + 1..]
                        .iter()
                        .position(|&ch| ch == '"')
                        .map(|offset| i + 1 + offset)
                        .unwrap_or(chars.len());
                    let words = words_in(&chars[i + 1..end]);
                    match words.len() {
                        0 => {}
                        1 => tokens.push(Token::Word {
                            text: words[0].clone(),
                            prefix: false,
                        }),
                        _ => tokens.push(Token::Phrase(words)),
                    }
                    i = end;
                }
                _ => {}
            }
            i += 1;
        }

        tokens
    }

    fn keyword(&self, text: &str, prefix: bool) -> Option<Token> {
        if prefix {
            return None;
        }
        match text.to_lowercase().as_str() {
            "and" => Some(Token::And),
            "or" if self.options.or => Some(Token::Or),
            _ => None,
        }
    }
}

impl TermParser for TsQueryConverter {
    fn parse(&self, raw: &str) -> String {
        self.convert(raw)
    }
}

/// A `-` negates only at the start of an operand, so `well-known` stays two words.
fn starts_operand(chars: &[char], i: usize) -> bool {
    i == 0 || !chars[i - 1].is_alphanumeric()
}

fn words_in(chars: &[char]) -> Vec<String> {
    chars
        .split(|c| !c.is_alphanumeric())
        .filter(|run| !run.is_empty())
        .map(|run| run.iter().collect())
        .collect()
}

/// Deepest parenthesized group the parser descends into. Opening
/// parentheses past this depth are treated as separators.
pub const MAX_GROUP_DEPTH: usize = 32;

/// Forgiving recursive descent: OR < AND < NOT.
///
/// Dangling operators, empty groups and unbalanced parentheses are skipped
/// instead of rejected. Recursion only happens on `(`, so bounding group
/// depth bounds both the parse and the rendered tree.
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn parse(mut self) -> Option<Node> {
        let mut parts = Vec::new();
        loop {
            if let Some(node) = self.parse_or() {
                parts.push(node);
            }
            match self.peek() {
                // Stray closing parenthesis at top level.
                Some(Token::Close) => self.pos += 1,
                _ => break,
            }
        }
        Node::combine(parts, false)
    }

    fn parse_or(&mut self) -> Option<Node> {
        let mut operands = Vec::new();
        loop {
            if let Some(node) = self.parse_and() {
                operands.push(node);
            }
            match self.peek() {
                Some(Token::Or) => self.pos += 1,
                _ => break,
            }
        }
        Node::combine(operands, true)
    }

    fn parse_and(&mut self) -> Option<Node> {
        let mut operands = Vec::new();
        loop {
            match self.peek() {
                None | Some(Token::Or) | Some(Token::Close) => break,
                Some(Token::And) => self.pos += 1,
                Some(_) => {
                    if let Some(node) = self.parse_not() {
                        operands.push(node);
                    }
                }
            }
        }
        Node::combine(operands, false)
    }

    fn parse_not(&mut self) -> Option<Node> {
        let mut negations = 0;
        while let Some(Token::Not) = self.peek() {
            negations += 1;
            self.pos += 1;
        }
        let operand = self.parse_primary()?;
        if negations % 2 == 1 {
            Some(Node::Not(Box::new(operand)))
        } else {
            Some(operand)
        }
    }

    fn parse_primary(&mut self) -> Option<Node> {
        match self.peek()? {
            Token::Word { text, prefix } => {
                self.pos += 1;
                Some(Node::Term {
                    text: text.clone(),
                    prefix: *prefix,
                })
            }
            Token::Phrase(words) => {
                self.pos += 1;
                Some(Node::Phrase(words.clone()))
            }
            Token::Open if self.depth >= MAX_GROUP_DEPTH => {
                self.pos += 1;
                None
            }
            Token::Open => {
                self.pos += 1;
                self.depth += 1;
                let inner = self.parse_or();
                self.depth -= 1;
                if let Some(Token::Close) = self.peek() {
                    self.pos += 1;
                }
                inner
            }
            Token::And | Token::Or | Token::Not | Token::Close => None,
        }
    }
}
