// Table-driven cases: each `test_case!` builds one lambda and checks any of
// its `result`, `error` or `listing` fields.

// Matches a result against an `Err(..)` pattern, a guarded pattern, or an
// expected `Ok` value
#[macro_export]
macro_rules! assert_case {
    ($result:expr, { Err($($pattern:tt)*) }) => {
        match $result {
            Err($($pattern)*) => {},
            other => panic!("Expected Err({}) but got {:#?}", stringify!($($pattern)*), other),
        }
    };

    ($result:expr, { $pattern:pat if $guard:expr }) => {
        match $result {
            $pattern if $guard => {},
            other => panic!("Expected {} if {} but got {:?}", stringify!($pattern), stringify!($guard), other),
        }
    };

    // Default case - compare the Ok value for equality
    ($result:expr, { $expected:expr }) => {
        match $result {
            Ok(actual) => {
                pretty_assertions::assert_eq!($expected, actual, "\n\n< expected / got >");
            },
            other => panic!("Expected Ok(...) but got {:?}", other),
        }
    };
}

// Expands one assertion field into a test function
#[macro_export]
macro_rules! handle_case {
    ([$($attrs:meta)*] result, $expected:tt) => {
        $(#[$attrs])*
        #[test]
        fn validate_result() {
            let result = lightvm::compile(&input()).and_then(|lambda| lambda.run(&mut []));
            assert_case!(result, $expected);
        }
    };

    ([$($attrs:meta)*] error, $expected:tt) => {
        $(#[$attrs])*
        #[test]
        fn validate_error() {
            // ariadne pads some lines with trailing spaces
            fn normalize(text: &str) -> String {
                text.lines().map(|line| format!("{}\n", line.trim_end())).collect()
            }

            let err = match lightvm::compile(&input()).and_then(|lambda| lambda.run(&mut [])) {
                Err(e) => e,
                Ok(value) => panic!("Expected an error, but the lambda returned {:?}", value),
            };
            let mut buf = Vec::new();
            let config = lightvm::RenderConfig { color: false, ..Default::default() };
            lightvm::render_error_to(&err, &mut buf, &config).unwrap();
            let rendered = normalize(&String::from_utf8_lossy(&buf));

            let result: Result<&str, ()> = Ok(rendered.as_str());
            assert_case!(result, $expected);
        }
    };

    ([$($attrs:meta)*] listing, $expected:tt) => {
        $(#[$attrs])*
        #[test]
        fn validate_listing() {
            let lambda = lightvm::compile(&input()).unwrap();
            lambda.interpreter().validate().unwrap();
            let listing: Vec<String> = lambda
                .interpreter()
                .instructions()
                .iter()
                .map(ToString::to_string)
                .collect();
            let result: Result<Vec<&str>, ()> = Ok(listing.iter().map(String::as_str).collect());
            assert_case!(result, $expected);
        }
    };

    ([$($attrs:meta)*] $other:ident, $expected:tt) => {
        compile_error!(concat!("unknown case field `", stringify!($other), "`"));
    };
}

// One module per case; each `field: { expected }` entry becomes a test
#[macro_export]
macro_rules! test_case {
    (
        name: $name:ident,
        input: $input:expr,
        $( $(#[$attr:meta])* $field:ident: $expected:tt ),* $(,)?
    ) => {
        mod $name {
            #![allow(unused_imports, dead_code)]

            use super::*;

            // The lambda under test, rebuilt for every assertion
            fn input() -> std::sync::Arc<lightvm::expr::LambdaExpr> {
                $input
            }

            $( handle_case! {[$($attr)*] $field, $expected} )*
        }
    };
}
