//! Macros used to generate the builder style setters of the `jwx` types.

#[doc(inline)]
pub use ::paste::paste;

#[doc(hidden)]
#[macro_export]
macro_rules! __generate_set_and_with {
    (
        $(#[$outer_doc:meta])*
        $vis:vis fn $fn_name:ident(mut $self_token:ident) -> Self {
            $($body:tt)*
        }
    ) => {
        $crate::macros::paste! {
            $(#[$outer_doc])*
            #[must_use]
            $vis fn [<with_ $fn_name>](mut $self_token) -> Self {
                $($body)*
            }

            $(#[$outer_doc])*
            $vis fn [<set_ $fn_name>](&mut $self_token) -> &mut Self {
                $($body)*
            }
        }
    };
    (
        $(#[$outer_doc:meta])*
        $vis:vis fn $fn_name:ident(mut $self_token:ident, $param_name:ident: Option<$param_ty:ty> $(,)?) -> Self {
            $($body:tt)*
        }
    ) => {
        $crate::macros::paste! {
            $(#[$outer_doc])*
            #[must_use]
            $vis fn [<maybe_with_ $fn_name>](mut $self_token, $param_name: Option<$param_ty>) -> Self {
                $($body)*
            }

            $(#[$outer_doc])*
            $vis fn [<maybe_set_ $fn_name>](&mut $self_token, $param_name: Option<$param_ty>) -> &mut Self {
                $($body)*
            }

            $(#[$outer_doc])*
            #[must_use]
            $vis fn [<with_ $fn_name>](mut $self_token, $param_name: $param_ty) -> Self {
                let $param_name: Option<$param_ty> = Some($param_name);
                $($body)*
            }

            $(#[$outer_doc])*
            $vis fn [<set_ $fn_name>](&mut $self_token, $param_name: $param_ty) -> &mut Self {
                let $param_name: Option<$param_ty> = Some($param_name);
                $($body)*
            }

            $(#[$outer_doc])*
            #[must_use]
            $vis fn [<without_ $fn_name>](mut $self_token) -> Self {
                let $param_name: Option<$param_ty> = None;
                $($body)*
            }

            $(#[$outer_doc])*
            $vis fn [<unset_ $fn_name>](&mut $self_token) -> &mut Self {
                let $param_name: Option<$param_ty> = None;
                $($body)*
            }
        }
    };
    (
        $(#[$outer_doc:meta])*
        $vis:vis fn $fn_name:ident(mut $self_token:ident, $($param_name:ident: $param_ty:ty),+ $(,)?) -> Self {
            $($body:tt)*
        }
    ) => {
        $crate::macros::paste! {
            $(#[$outer_doc])*
            #[must_use]
            $vis fn [<with_ $fn_name>](mut $self_token, $($param_name: $param_ty),+) -> Self {
                $($body)*
            }

            $(#[$outer_doc])*
            $vis fn [<set_ $fn_name>](&mut $self_token, $($param_name: $param_ty),+) -> &mut Self {
                $($body)*
            }
        }
    };
    (
        $(#[$outer_doc:meta])*
        $vis:vis fn $fn_name:ident(mut $self_token:ident, $($param_name:ident: $param_ty:ty),+ $(,)?) -> Result<Self, $error:ty> {
            $($body:tt)*
        }
    ) => {
        $crate::macros::paste! {
            $(#[$outer_doc])*
            $vis fn [<try_with_ $fn_name>](mut $self_token, $($param_name: $param_ty),+) -> Result<Self, $error> {
                $($body)*
            }

            $(#[$outer_doc])*
            $vis fn [<try_set_ $fn_name>](&mut $self_token, $($param_name: $param_ty),+) -> Result<&mut Self, $error> {
                $($body)*
            }
        }
    };
}

#[doc(inline)]
pub use crate::__generate_set_and_with as generate_set_and_with;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Settings {
        name: Option<String>,
        flag: bool,
        limit: usize,
    }

    impl Settings {
        generate_set_and_with! {
            /// Set the name.
            fn name(mut self, name: Option<String>) -> Self {
                self.name = name;
                self
            }
        }

        generate_set_and_with! {
            /// Enable the flag.
            fn flag(mut self) -> Self {
                self.flag = true;
                self
            }
        }

        generate_set_and_with! {
            /// Set a limit which must be non-zero.
            fn limit(mut self, limit: usize) -> Result<Self, String> {
                if limit == 0 {
                    return Err("limit must be positive".to_owned());
                }
                self.limit = limit;
                Ok(self)
            }
        }
    }

    #[test]
    fn with_and_set_variants() {
        let settings = Settings::default()
            .with_name("jwx".to_owned())
            .with_flag()
            .try_with_limit(3)
            .unwrap();
        assert_eq!(Some("jwx"), settings.name.as_deref());
        assert!(settings.flag);
        assert_eq!(3, settings.limit);

        let mut settings = settings.without_name();
        assert!(settings.name.is_none());
        settings.set_name("again".to_owned());
        assert_eq!(Some("again"), settings.name.as_deref());
        settings.try_set_limit(0).unwrap_err();
        assert_eq!(3, settings.limit);
    }
}
