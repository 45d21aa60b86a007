// ABOUTME: The Lissp reader: recursive parser, templates, gensyms, qualification, tags

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::LazyLock;

use blake2::digest::{Update, VariableOutput};
use blake2::Blake2sVar;
use regex::{Captures, Regex};

use crate::compiler::Compiler;
use crate::config::GENSYM_BYTES;
use crate::env::Environment;
use crate::error::{LisspError, SyntaxErr};
use crate::eval::{self, CallArgs, Object};
use crate::expand;
use crate::form::{is_lissp_unicode, Form};
use crate::lexer::{Lexer, Position, TokenKind};
use crate::munger::{force_qz_encode, is_identifier, munge};

/// The process-wide template counter. Deterministic gensym hashes
/// cross-reference it, so the same number is never allocated twice
/// within one process. Determinism requires single-threaded reading,
/// since order affects allocation.
static TEMPLATE_COUNT: AtomicU64 = AtomicU64::new(0);

fn next_template_count() -> u64 {
    TEMPLATE_COUNT.fetch_add(1, Ordering::Relaxed) + 1
}

static ESCAPE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\(.)").expect("escape pattern"));
static COMMENT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)\n$|^ *;+ ?").expect("comment pattern"));
static GENSYM_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_Qz[a-z2-7]+__").expect("gensym pattern"));
static MACRO_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^_macro_\.[^.]+$").expect("macro tag pattern"));

/// A parsed comment token (line comment block). The reader normally
/// discards these, but they can be tag arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub token: String,
}

impl Comment {
    pub fn new(token: impl Into<String>) -> Self {
        Comment {
            token: token.into(),
        }
    }

    /// The comment text inside the comment token: strips any leading
    /// indent, the `;` character(s), and up to one following space for
    /// each line in the block.
    pub fn contents(&self) -> String {
        COMMENT_PREFIX.replace_all(&self.token, "").into_owned()
    }
}

/// A parsed object: richer than `Form` because unquote markers, kwargs,
/// and comments flow through the reader before templates and tags
/// consume them.
#[derive(Debug, Clone)]
pub(crate) enum Parsed {
    Atom(Form),
    Tuple(Vec<Parsed>),
    Comment(Comment),
    Unquote {
        target: &'static str,
        value: Box<Parsed>,
    },
    Kwarg {
        k: String,
        v: Box<Parsed>,
    },
}

/// The Lissp reader front end. Wraps a Hissp compiler instance and
/// creates Lissp parsers.
pub struct Lissp {
    pub compiler: Compiler,
    pub filename: String,
}

impl Lissp {
    pub fn new(
        qualname: &str,
        env: Option<Rc<Environment>>,
        evaluate: bool,
        filename: &str,
    ) -> Self {
        Lissp {
            compiler: Compiler::new(qualname, env, evaluate),
            filename: filename.to_string(),
        }
    }

    /// The wrapped compiler's environment.
    pub fn env(&self) -> Rc<Environment> {
        self.compiler.env.clone()
    }

    /// Read Lissp code and pass it on to the Hissp compiler.
    pub fn compile(&mut self, code: &str) -> Result<String, LisspError> {
        let forms = self.reads(code)?;
        self.compiler.compile(&forms)
    }

    /// Read Hissp forms from a code string.
    pub fn reads(&mut self, code: &str) -> Result<Vec<Form>, SyntaxErr> {
        let lexer = Lexer::new(code, &self.filename);
        let mut parser = Parser::new(
            self.compiler.env.clone(),
            self.compiler.qualname.clone(),
            lexer,
        );
        parser.read_all()
    }
}

enum Event {
    Item(Parsed),
    Close,
    Eof,
}

/// The parser for the Lissp language. Parses Lissp tokens into Hissp
/// syntax trees.
///
/// The special tags are handled here: `'` quote, backtick template,
/// `_#` discard, `.#` inject, plus the three template helpers `,`
/// unquote, `,@` splice, and `$#` gensym, and the stararg tokens
/// `*=`/`**=`. Special tags are reserved by the reader and cannot be
/// reassigned.
pub(crate) struct Parser {
    env: Rc<Environment>,
    qualname: String,
    tokens: Lexer,
    counters: Vec<u64>,
    context: Vec<char>,
    depth: Vec<usize>,
    pos: usize,
    hasher: Blake2sVar,
}

impl Parser {
    pub fn new(env: Rc<Environment>, qualname: String, tokens: Lexer) -> Self {
        let mut hasher = Blake2sVar::new(GENSYM_BYTES).expect("valid digest size");
        hasher.update(tokens.code.as_bytes());
        hasher.update(env.name().as_bytes());
        Parser {
            env,
            qualname,
            tokens,
            counters: Vec::new(),
            context: Vec::new(),
            depth: Vec::new(),
            pos: 0,
            hasher,
        }
    }

    /// Read all top-level forms. Comments are dropped from the output.
    pub fn read_all(&mut self) -> Result<Vec<Form>, SyntaxErr> {
        let mut forms = Vec::new();
        loop {
            match self.next_event()? {
                Event::Item(Parsed::Comment(_)) => continue,
                Event::Item(parsed) => forms.push(self.into_form(parsed)?),
                Event::Close => {
                    return Err(self.error("too many `)`s"));
                }
                Event::Eof => break,
            }
        }
        self.check_depth()?;
        Ok(forms)
    }

    fn position(&self, index: Option<usize>) -> Position {
        self.tokens.position(index.unwrap_or(self.pos))
    }

    fn error(&self, msg: impl Into<String>) -> SyntaxErr {
        SyntaxErr::new(msg, self.position(None))
    }

    fn error_at(&self, msg: impl Into<String>, pos: usize) -> SyntaxErr {
        SyntaxErr::new(msg, self.position(Some(pos)))
    }

    fn next_event(&mut self) -> Result<Event, SyntaxErr> {
        while let Some(token) = self.tokens.next_token() {
            self.pos = token.pos;
            match token.kind {
                TokenKind::Whitespace => continue,
                TokenKind::Comment => {
                    return Ok(Event::Item(Parsed::Comment(Comment::new(token.text))));
                }
                TokenKind::Badspace => {
                    return Err(self.error(format!(
                        "{:?} is not whitespace in Lissp. Indent with spaces only.",
                        token.text
                    )));
                }
                TokenKind::Open => return Ok(Event::Item(self.open()?)),
                TokenKind::Close => {
                    self.close()?;
                    return Ok(Event::Close);
                }
                TokenKind::Template => return Ok(Event::Item(self.template()?)),
                TokenKind::Unquote => return Ok(Event::Item(self.unquote(&token.text)?)),
                TokenKind::Quote => {
                    let pulled = self.pull("'", None)?;
                    return Ok(Event::Item(Parsed::Tuple(vec![
                        Parsed::Atom(Form::sym("quote")),
                        pulled,
                    ])));
                }
                TokenKind::Inject => return Ok(Event::Item(self.inject()?)),
                TokenKind::Discard => {
                    self.pull("_#", None)?;
                    continue;
                }
                TokenKind::Gensym => {
                    let pulled = self.pull("$#", None)?;
                    return Ok(Event::Item(self.gensym(pulled)?));
                }
                TokenKind::Tag => return Ok(Event::Item(self.tag(&token.text)?)),
                TokenKind::Stararg | TokenKind::Kwarg => {
                    let k = token.text[..token.text.len() - 1].to_string();
                    let v = self.pull(&token.text, None)?;
                    return Ok(Event::Item(Parsed::Kwarg {
                        k,
                        v: Box::new(v),
                    }));
                }
                TokenKind::Unicode => {
                    return Ok(Event::Item(Parsed::Atom(self.unicode_atom(&token.text)?)));
                }
                TokenKind::Fragment => {
                    let inner = token.text[1..token.text.len() - 1].replace("||", "|");
                    return Ok(Event::Item(Parsed::Atom(Form::Str(inner))));
                }
                TokenKind::Continued => {
                    return Err(SyntaxErr::soft(
                        "Incomplete string token.",
                        self.position(None),
                    ));
                }
                TokenKind::Badfrag => return Err(self.error("unpaired |")),
                TokenKind::Control => {
                    return Ok(Event::Item(Parsed::Atom(Form::Str(escape(&token.text)))));
                }
                TokenKind::Bare => return Ok(Event::Item(Parsed::Atom(bare(&token.text)))),
                TokenKind::Error => return Err(self.error("can't read this")),
            }
        }
        Ok(Event::Eof)
    }

    fn open(&mut self) -> Result<Parsed, SyntaxErr> {
        self.depth.push(self.pos);
        let mut items = Vec::new();
        loop {
            match self.next_event()? {
                Event::Item(Parsed::Comment(_)) => continue,
                Event::Item(parsed) => items.push(parsed),
                Event::Close => return Ok(Parsed::Tuple(items)),
                // The missing `)` is reported at end of parse.
                Event::Eof => return Ok(Parsed::Tuple(items)),
            }
        }
    }

    fn close(&mut self) -> Result<(), SyntaxErr> {
        if self.depth.pop().is_none() {
            return Err(self.error("too many `)`s"));
        }
        Ok(())
    }

    fn check_depth(&mut self) -> Result<(), SyntaxErr> {
        if let Some(pos) = self.depth.pop() {
            return Err(SyntaxErr::soft(
                "form missing a `)`",
                self.position(Some(pos)),
            ));
        }
        Ok(())
    }

    /// Grab the next parsed object, for a tag that needs an argument.
    fn pull(&mut self, tag: &str, at: Option<usize>) -> Result<Parsed, SyntaxErr> {
        let pos = at.unwrap_or(self.pos);
        let depth = self.depth.len();
        match self.next_event()? {
            Event::Item(parsed) => Ok(parsed),
            Event::Close => Err(self.error_at(format!("tag {tag:?} missing argument"), pos)),
            Event::Eof => {
                let msg = format!("tag {tag:?} missing argument");
                if self.depth.len() == depth {
                    Err(SyntaxErr::soft(msg, self.position(Some(pos))))
                } else {
                    Err(self.error_at(msg, pos))
                }
            }
        }
    }

    fn into_form(&self, parsed: Parsed) -> Result<Form, SyntaxErr> {
        match parsed {
            Parsed::Atom(form) => Ok(form),
            Parsed::Tuple(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.into_form(item)?);
                }
                Ok(Form::Tuple(out))
            }
            Parsed::Comment(_) => Err(self.error("comment object in Hissp")),
            Parsed::Unquote { .. } => Err(self.error("unquote outside of template")),
            Parsed::Kwarg { .. } => Err(self.error("kwarg outside of tag")),
        }
    }

    fn object_to_parsed(&self, object: Object) -> Result<Parsed, SyntaxErr> {
        match object {
            Object::Form(form) => Ok(Parsed::Atom(form)),
            Object::Comment(token) => Ok(Parsed::Comment(Comment::new(token))),
            other => Err(self.error(format!(
                "{} can't be read into Hissp",
                eval::py_repr(&other)
            ))),
        }
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    fn template(&mut self) -> Result<Parsed, SyntaxErr> {
        self.counters.push(next_template_count());
        self.context.push('`');
        let result = self
            .pull("`", None)
            .and_then(|pulled| self.template_form(pulled));
        self.context.pop();
        self.counters.pop();
        Ok(Parsed::Atom(result?))
    }

    fn unquote(&mut self, text: &str) -> Result<Parsed, SyntaxErr> {
        let target = if text == ",@" { ":*" } else { ":?" };
        self.context.push(',');
        let commas = self.context.iter().filter(|&&c| c == ',').count();
        let ticks = self.context.iter().filter(|&&c| c == '`').count();
        if commas > ticks {
            self.context.pop();
            return Err(self.error("unquote outside of template"));
        }
        let result = self.pull(text, None);
        self.context.pop();
        Ok(Parsed::Unquote {
            target,
            value: Box::new(result?),
        })
    }

    /// Process a parsed object as a template: rewrite it so that
    /// evaluating the rewrite produces the same data structure the
    /// reader would have produced for the form literally, except that
    /// unquoted subforms evaluate normally, splices interpolate, and
    /// unqualified symbols qualify.
    fn template_form(&mut self, parsed: Parsed) -> Result<Form, SyntaxErr> {
        match parsed {
            Parsed::Atom(ref form) if is_lissp_unicode(form) => Ok(Form::tuple(vec![
                Form::sym("quote"),
                form.clone(),
            ])),
            Parsed::Tuple(items) => {
                let mut spine = vec![Form::sym(""), Form::sym(":")];
                for (target, value) in self.template_forms(items)? {
                    spine.push(Form::sym(target));
                    spine.push(value);
                }
                spine.push(Form::sym(":?"));
                spine.push(Form::sym(""));
                Ok(Form::Tuple(spine))
            }
            Parsed::Atom(Form::Str(ref s)) if !s.starts_with(':') => Ok(Form::tuple(vec![
                Form::sym("quote"),
                Form::Str(self.qualify(s, false)),
            ])),
            Parsed::Unquote { target, value } => {
                if target == ":?" {
                    return self.into_form(*value);
                }
                Err(self.error("splice not in tuple"))
            }
            Parsed::Atom(form) => Ok(form),
            Parsed::Comment(_) => Err(self.error("comment object in template")),
            Parsed::Kwarg { .. } => Err(self.error("kwarg outside of tag")),
        }
    }

    /// Template the items of a tuple as (target, value) pairs for the
    /// entuple spine. The first item is invocation position.
    fn template_forms(
        &mut self,
        items: Vec<Parsed>,
    ) -> Result<Vec<(&'static str, Form)>, SyntaxErr> {
        let mut out = Vec::with_capacity(items.len());
        let mut invocation = true;
        for item in items {
            match item {
                Parsed::Atom(Form::Str(ref s))
                    if !s.starts_with(':') && !is_lissp_unicode(&Form::sym(s)) =>
                {
                    out.push((
                        ":?",
                        Form::tuple(vec![
                            Form::sym("quote"),
                            Form::Str(self.qualify(s, invocation)),
                        ]),
                    ));
                }
                Parsed::Unquote { target, value } => {
                    out.push((target, self.into_form(*value)?));
                }
                Parsed::Tuple(_) => out.push((":?", self.template_form(item)?)),
                Parsed::Atom(Form::Str(ref s)) if is_lissp_unicode(&Form::sym(s)) => {
                    out.push((
                        ":?",
                        Form::tuple(vec![Form::sym("quote"), Form::sym(s)]),
                    ));
                }
                Parsed::Atom(form) => out.push((":?", form)),
                Parsed::Comment(_) => return Err(self.error("comment object in template")),
                Parsed::Kwarg { .. } => return Err(self.error("kwarg outside of tag")),
            }
            invocation = false;
        }
        Ok(out)
    }

    /// Qualify a symbol based on the current context.
    pub(crate) fn qualify(&self, symbol: &str, invocation: bool) -> String {
        if !is_qualifiable(symbol) {
            return symbol.to_string();
        }
        if invocation
            && self.env.has_macro_namespace()
            && self.env.get_macro(symbol).is_some()
        {
            return format!("{}.._macro_.{symbol}", self.qualname); // Known macro.
        }
        let shadowed = symbol
            .split('.')
            .next()
            .is_some_and(|first| self.env.contains(first));
        if crate::builtins::BUILTIN_NAMES.contains(&symbol) && !shadowed {
            return format!("builtins..{symbol}"); // Known builtin, not shadowed (yet).
        }
        if invocation && !symbol.contains('.') {
            // Could still be a recursive macro.
            return format!("{}..QzMaybe_.{symbol}", self.qualname);
        }
        format!("{}..{symbol}", self.qualname)
    }

    // ------------------------------------------------------------------
    // Gensyms
    // ------------------------------------------------------------------

    /// Generate a symbol unique to the current template. Re-munges any
    /// `$`s as a gensym hash, or adds it as a prefix if there aren't
    /// any. Gensym hashes are deterministic for reproducible builds:
    /// inputs are the code string being read, the current `__name__`,
    /// and the template's sequence number.
    fn gensym(&mut self, parsed: Parsed) -> Result<Parsed, SyntaxErr> {
        let form = match parsed {
            Parsed::Atom(Form::Str(s)) => s,
            _ => return Err(self.error("gensym target must be a symbol")),
        };
        let counter = self.gensym_counter()?;
        let mut hasher = self.hasher.clone();
        hasher.update(&counter_bytes(counter));
        let mut digest = [0u8; GENSYM_BYTES];
        hasher
            .finalize_variable(&mut digest)
            .expect("digest size matches");
        let hash = data_encoding::BASE32_NOPAD
            .encode(&digest)
            .to_ascii_lowercase();
        let prefix = format!("_Qz{hash}__");
        let marker = munge("$");
        let name = if form.contains(&marker) {
            form.replace(&marker, &prefix)
        } else {
            format!("{prefix}{form}")
        };
        Ok(Parsed::Atom(Form::Str(name)))
    }

    fn gensym_counter(&mut self) -> Result<u64, SyntaxErr> {
        if self.context.is_empty() {
            // A gensym outside any template is its own template.
            return Ok(next_template_count());
        }
        let ticks = self.context.iter().filter(|&&c| c == '`').count();
        let commas = self.context.iter().filter(|&&c| c == ',').count();
        if commas > ticks {
            return Err(self.error("gensym outside of template"));
        }
        if self.context.last() == Some(&'`') {
            return self
                .counters
                .last()
                .copied()
                .ok_or_else(|| self.error("gensym outside of template"));
        }
        self.counters
            .get(ticks - commas)
            .copied()
            .ok_or_else(|| self.error("gensym outside of template"))
    }

    // ------------------------------------------------------------------
    // Inject and tags
    // ------------------------------------------------------------------

    /// `.#` evaluates the next form as Hissp at read time, in the
    /// current environment, substituting the resulting value.
    fn inject(&mut self) -> Result<Parsed, SyntaxErr> {
        let pos = self.pos;
        let pulled = self.pull(".#", None)?;
        let form = self.into_form(pulled)?;
        let result = {
            let _context = expand::macro_context(self.env.clone());
            eval::eval_form(&form, &self.env)
        };
        match result {
            Ok(object) => self.object_to_parsed(object),
            Err(e) => Err(self.error_at(format!("inject failed: {e}"), pos)),
        }
    }

    fn tag(&mut self, token: &str) -> Result<Parsed, SyntaxErr> {
        let unescaped = ESCAPE.replace_all(token, "").into_owned();
        let arity = unescaped.matches('#').count();
        let label_text = &token[..token.len() - arity];
        let pos = self.pos;
        let depth = self.depth.len();

        let mut args: Vec<Object> = Vec::new();
        let mut kwargs: Vec<(String, Object)> = Vec::new();
        let first = self.pull(token, Some(pos))?;
        self.collect(&mut args, &mut kwargs, first)?;
        let mut count = 1;
        while count < arity {
            match self.next_event()? {
                Event::Item(parsed) => {
                    self.collect(&mut args, &mut kwargs, parsed)?;
                    count += 1;
                }
                Event::Close => {
                    return Err(
                        self.error_at(format!("reader tag {token:?} missing argument"), pos)
                    );
                }
                Event::Eof => {
                    let msg = format!("reader tag {token:?} missing argument");
                    if self.depth.len() == depth {
                        return Err(SyntaxErr::soft(msg, self.position(Some(pos))));
                    }
                    return Err(self.error_at(msg, pos));
                }
            }
        }

        let label = tag_label(label_text);
        let function = if label.contains("..") {
            self.fully_qualified(&label, pos)?
        } else {
            self.local_tag(&label, pos)?
        };
        let result = {
            let _context = expand::macro_context(self.env.clone());
            eval::call_object(&function, CallArgs { args, kwargs })
        };
        match result {
            Ok(object) => self.object_to_parsed(object),
            Err(e) => Err(self.error_at(format!("tag {label:?} error: {e}"), pos)),
        }
    }

    /// Fold a parsed object into a tag's arguments: kwarg objects land
    /// in the keywords (with `*`/`**` splatting), everything else is
    /// positional.
    fn collect(
        &self,
        args: &mut Vec<Object>,
        kwargs: &mut Vec<(String, Object)>,
        parsed: Parsed,
    ) -> Result<(), SyntaxErr> {
        match parsed {
            Parsed::Kwarg { k, v } => {
                let value = self.parsed_to_object(*v)?;
                match k.as_str() {
                    "*" => match value {
                        Object::Form(Form::Tuple(items)) | Object::Form(Form::List(items)) => {
                            args.extend(items.into_iter().map(Object::Form));
                        }
                        other => {
                            return Err(self.error(format!(
                                "can't splat {} into tag arguments",
                                eval::py_repr(&other)
                            )));
                        }
                    },
                    "**" => match value {
                        Object::Form(Form::Map(pairs)) => {
                            for (k, v) in pairs {
                                match k {
                                    Form::Str(name) => kwargs.push((name, Object::Form(v))),
                                    other => {
                                        return Err(self.error(format!(
                                            "tag keyword must be a string, got {other}"
                                        )));
                                    }
                                }
                            }
                        }
                        other => {
                            return Err(self.error(format!(
                                "can't splat {} into tag keywords",
                                eval::py_repr(&other)
                            )));
                        }
                    },
                    _ => kwargs.push((munge(&escape(&k)), value)),
                }
            }
            parsed => args.push(self.parsed_to_object(parsed)?),
        }
        Ok(())
    }

    fn parsed_to_object(&self, parsed: Parsed) -> Result<Object, SyntaxErr> {
        match parsed {
            Parsed::Comment(comment) => Ok(Object::Comment(comment.token)),
            other => Ok(Object::Form(self.into_form(other)?)),
        }
    }

    /// Resolve a fully-qualified tag through the module registry, with
    /// dynamic lookup. A `_macro_` attribute gets the munged `#`
    /// suffix appended.
    fn fully_qualified(&self, label: &str, pos: usize) -> Result<Object, SyntaxErr> {
        let (module, function) = match label.split_once("..") {
            Some(parts) => parts,
            None => return Err(self.error_at(format!("unknown tag {label:?}"), pos)),
        };
        let mut function = function.to_string();
        if MACRO_TAG.is_match(&function) {
            function.push_str(&munge("#"));
        }
        eval::resolve_qualified(&format!("{module}..{function}"))
            .map_err(|e| self.error_at(format!("unknown tag {label:?}: {e}"), pos))
    }

    /// Resolve a tag in the current `_macro_` namespace, with the
    /// munged `#` suffix.
    fn local_tag(&self, label: &str, pos: usize) -> Result<Object, SyntaxErr> {
        let label = label.replace('.', &force_qz_encode('.'));
        self.env
            .get_macro(&format!("{label}{}", munge("#")))
            .ok_or_else(|| self.error_at(format!("unknown tag {label:?}"), pos))
    }

    // ------------------------------------------------------------------
    // String-like tokens
    // ------------------------------------------------------------------

    /// A Unicode token reads via the host's string-literal semantics;
    /// the result is emitted as a parenthesized string literal so the
    /// emitter treats it as a literal value.
    fn unicode_atom(&self, token: &str) -> Result<Form, SyntaxErr> {
        let cleaned = token.replace("\\\n", "").replace('\n', "\\n");
        match crate::pyrepr::parse_string_literal(&cleaned) {
            Some(value) => Ok(Form::Str(format!("({})", crate::pyrepr::repr_str(&value)))),
            None => Err(self.error("invalid string token")),
        }
    }
}

/// Process the backslashes in a token: `\.` and `\:` force-encode, any
/// other escaped character stands for itself.
pub(crate) fn escape(atom: &str) -> String {
    ESCAPE
        .replace_all(atom, |caps: &Captures| {
            let c = caps[1].chars().next().unwrap_or_default();
            if c == '.' || c == ':' {
                force_qz_encode(c)
            } else {
                c.to_string()
            }
        })
        .into_owned()
}

/// Preprocess a bare token: reads as a literal if it looks like one,
/// otherwise handles escapes and munges to a symbol.
pub(crate) fn bare(token: &str) -> Form {
    if !token.starts_with('\\') {
        if let Some(form) = literal_atom(&escape(token)) {
            return form;
        }
    }
    Form::Str(munge(&escape(token)))
}

fn literal_atom(text: &str) -> Option<Form> {
    match text {
        "True" => return Some(Form::Bool(true)),
        "False" => return Some(Form::Bool(false)),
        "None" => return Some(Form::Nil),
        "..." => return Some(Form::Ellipsis),
        _ => {}
    }
    if text.starts_with('_') || text.ends_with('_') {
        return None;
    }
    let unsigned = text
        .strip_prefix('-')
        .or_else(|| text.strip_prefix('+'))
        .unwrap_or(text);
    let first = unsigned.chars().next()?;
    if !first.is_ascii_digit() && first != '.' {
        return None;
    }
    let cleaned = text.replace('_', "");
    let body = cleaned
        .strip_prefix('-')
        .or_else(|| cleaned.strip_prefix('+'))
        .unwrap_or(&cleaned);
    let negative = cleaned.starts_with('-');
    let radix = for_radix(body);
    if let Some((digits, radix)) = radix {
        if let Ok(n) = i64::from_str_radix(digits, radix) {
            return Some(Form::Int(if negative { -n } else { n }));
        }
        return None;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Some(Form::Int(n));
    }
    if let Ok(x) = cleaned.parse::<f64>() {
        return Some(Form::Float(x));
    }
    None
}

fn for_radix(body: &str) -> Option<(&str, u32)> {
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
    {
        if let Some(digits) = body.strip_prefix(prefix) {
            return Some((digits, radix));
        }
    }
    None
}

/// Munge a tag token's label, force-encoding a leading dot so the
/// attribute name is identifier-legal.
fn tag_label(label_text: &str) -> String {
    let label = munge(&escape(label_text));
    match label.strip_prefix('.') {
        Some(rest) => format!("{}{rest}", force_qz_encode('.')),
        None => label,
    }
}

/// Determines if a symbol can be qualified with a module.
///
/// Can't be `quote`, `__import__`, any reserved word, a prefix
/// auto-gensym, fully qualified, method syntax, or a module handle; and
/// must be a valid identifier or attribute identifier.
pub fn is_qualifiable(symbol: &str) -> bool {
    symbol != "quote"
        && symbol != "__import__"
        && !crate::builtins::is_python_keyword(symbol)
        && !GENSYM_PREFIX.is_match(symbol)
        && symbol.split('.').all(is_identifier)
}

fn counter_bytes(counter: u64) -> Vec<u8> {
    let bit_length = 64 - counter.leading_zeros() as usize;
    let nbytes = 1 + bit_length / 8;
    counter.to_be_bytes()[8 - nbytes..].to_vec()
}
