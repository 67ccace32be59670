#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[repr(u16)]
pub enum SyntaxKind {
    LEFT_PAREN,
    RIGHT_PAREN,
    LEFT_BRACE,
    RIGHT_BRACE,
    COMMA,
    COLON,
    SEMICOLON,
    EQ,
    HASH,

    FN_KW,
    LET_KW,
    TRUE_KW,
    FALSE_KW,
    IF_KW,
    ELIF_KW,
    ELSE_KW,
    ENDIF_KW,
    DEFINE_KW,
    UNDEF_KW,
    PRAGMA_KW,
    WARNING_KW,
    DISABLE_KW,
    RESTORE_KW,

    NAME,
    NUMBER,
    STRING,
    OPERATOR,

    UNKNOWN,
    EOF,

    MODULE,
    FN_DEF,
    PARAM,
    BLOCK,
    LET_STMT,
    INITIALIZER,
    EXPR_STMT,
    CALL_EXPR,
    BINARY_EXPR,
    NAME_EXPR,
    LITERAL,
    LIST,

    IF_DIRECTIVE,
    ELIF_DIRECTIVE,
    ELSE_DIRECTIVE,
    ENDIF_DIRECTIVE,
    DEFINE_DIRECTIVE,
    UNDEF_DIRECTIVE,
    PRAGMA_DIRECTIVE,

    ERROR,
    TOMBSTONE,
}

impl SyntaxKind {
    /// Returns `true` for the syntax of a preprocessing directive nested in
    /// directive trivia.
    pub fn is_directive(self) -> bool {
        matches!(
            self,
            Self::IF_DIRECTIVE
                | Self::ELIF_DIRECTIVE
                | Self::ELSE_DIRECTIVE
                | Self::ENDIF_DIRECTIVE
                | Self::DEFINE_DIRECTIVE
                | Self::UNDEF_DIRECTIVE
                | Self::PRAGMA_DIRECTIVE
        )
    }

    /// Returns `true` for keyword token kinds.
    pub fn is_keyword(self) -> bool {
        matches!(
            self,
            Self::FN_KW
                | Self::LET_KW
                | Self::TRUE_KW
                | Self::FALSE_KW
                | Self::IF_KW
                | Self::ELIF_KW
                | Self::ELSE_KW
                | Self::ENDIF_KW
                | Self::DEFINE_KW
                | Self::UNDEF_KW
                | Self::PRAGMA_KW
                | Self::WARNING_KW
                | Self::DISABLE_KW
                | Self::RESTORE_KW
        )
    }
}
