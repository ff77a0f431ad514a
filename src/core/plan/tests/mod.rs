mod parsing;
mod validation;
