//! Builtin specialization catalog.
//!
//! Registers the (attribute, shape) entries for dictionary, text, and
//! byte-sequence methods. This is the closed declarative source the
//! process-wide table is built from; nothing else adds entries.

use crate::shape::{Shape, VersionPredicate};
use crate::table::{EmptyCase, OperationSpec, ParamSpec, Variation, VariationTest};

use VariationTest::{Base, Supplied};

/// Every builtin entry, in registration order.
pub fn builtin_specs() -> Vec<OperationSpec> {
    let mut specs = Vec::new();
    register_dict_specs(&mut specs);
    register_text_specs(&mut specs, Shape::Str);
    register_text_specs(&mut specs, Shape::Bytes);
    specs
}

/// A method taking no arguments with a single specialized operation.
fn nullary(shape: Shape, attribute: &'static str, op: &'static str) -> OperationSpec {
    OperationSpec::new(attribute, shape).single(op)
}

/// `method(key)` / `method(key, default)`, as in `get`, `pop`, `setdefault`.
fn keyed_with_default(
    attribute: &'static str,
    short: &'static str,
    long: &'static str,
) -> OperationSpec {
    OperationSpec::new(attribute, Shape::Dict)
        .params(&[ParamSpec::any("key"), ParamSpec::any("default")])
        .variations(vec![
            Variation::new(short, &[0], Base),
            Variation::new(long, &[0, 1], Supplied(1)),
        ])
}

/// `method(first[, start[, end]])`, as in `find`, `count`, `startswith`.
fn ranged(
    shape: Shape,
    attribute: &'static str,
    first: ParamSpec,
    ops: [&'static str; 3],
) -> OperationSpec {
    OperationSpec::new(attribute, shape)
        .params(&[first, ParamSpec::any("start"), ParamSpec::any("end")])
        .variations(vec![
            Variation::new(ops[0], &[0], Base),
            Variation::new(ops[1], &[0, 1], Supplied(1)),
            Variation::new(ops[2], &[0, 1, 2], Supplied(2)),
        ])
}

/// `method([arg])` with one optional trailing parameter.
fn optional_one(
    shape: Shape,
    attribute: &'static str,
    param: ParamSpec,
    ops: [&'static str; 2],
) -> OperationSpec {
    OperationSpec::new(attribute, shape)
        .params(&[param])
        .variations(vec![
            Variation::new(ops[0], &[], Base),
            Variation::new(ops[1], &[0], Supplied(0)),
        ])
}

/// `method([a[, b]])` with two optional trailing parameters.
fn optional_two(
    shape: Shape,
    attribute: &'static str,
    params: [ParamSpec; 2],
    ops: [&'static str; 3],
) -> OperationSpec {
    OperationSpec::new(attribute, shape)
        .params(&params)
        .variations(vec![
            Variation::new(ops[0], &[], Base),
            Variation::new(ops[1], &[0], Supplied(0)),
            Variation::new(ops[2], &[0, 1], Supplied(1)),
        ])
}

/// `method(width[, fillchar])`, as in `center`, `ljust`, `rjust`.
fn padded(shape: Shape, attribute: &'static str, ops: [&'static str; 2]) -> OperationSpec {
    OperationSpec::new(attribute, shape)
        .params(&[ParamSpec::any("width"), ParamSpec::any("fillchar")])
        .variations(vec![
            Variation::new(ops[0], &[0], Base),
            Variation::new(ops[1], &[0, 1], Supplied(1)),
        ])
}

fn register_dict_specs(specs: &mut Vec<OperationSpec>) {
    use Shape::Dict;

    specs.push(nullary(Dict, "clear", "Clear"));
    specs.push(nullary(Dict, "copy", "Copy").returns(Dict));
    specs.push(nullary(Dict, "popitem", "Popitem"));

    // Classmethod on the type; calls through an instance stay generic.
    specs.push(OperationSpec::new("fromkeys", Dict));

    specs.push(keyed_with_default("get", "Get2", "Get3"));
    specs.push(keyed_with_default("pop", "Pop2", "Pop3"));
    specs.push(keyed_with_default("setdefault", "Setdefault2", "Setdefault3"));

    // Legacy returns fresh lists, modern returns live views.
    specs.push(OperationSpec::new("keys", Dict).version_split("KeysList", "Keys"));
    specs.push(OperationSpec::new("values", Dict).version_split("ValuesList", "Values"));
    specs.push(OperationSpec::new("items", Dict).version_split("ItemsList", "Items"));

    specs.push(
        OperationSpec::new("has_key", Dict)
            .applicable(VersionPredicate::LegacyOnly)
            .params(&[ParamSpec::any("key")])
            .single("Haskey"),
    );
    for (attribute, op) in [
        ("iteritems", "Iteritems"),
        ("iterkeys", "Iterkeys"),
        ("itervalues", "Itervalues"),
        ("viewitems", "Viewitems"),
        ("viewkeys", "Viewkeys"),
        ("viewvalues", "Viewvalues"),
    ] {
        specs.push(nullary(Dict, attribute, op).applicable(VersionPredicate::LegacyOnly));
    }

    // Keyword updates are not matched; `d.update()` is a no-op.
    specs.push(
        OperationSpec::new("update", Dict)
            .params(&[ParamSpec::any("iterable")])
            .variations(vec![Variation::new("Update2", &[0], Base)])
            .empty_case(EmptyCase::NoneWithSourceEffects),
    );
}

/// Text and byte sequences share most of their method surface. Byte-sequence
/// entries only exist for the modern generation, where bytes are distinct
/// from text.
fn register_text_specs(specs: &mut Vec<OperationSpec>, shape: Shape) {
    let applicable = match shape {
        Shape::Bytes => VersionPredicate::ModernOnly,
        _ => VersionPredicate::Always,
    };
    let start = specs.len();

    // Case mappings of an exact receiver keep its shape.
    for (attribute, op) in [
        ("capitalize", "Capitalize"),
        ("lower", "Lower"),
        ("upper", "Upper"),
        ("swapcase", "Swapcase"),
        ("title", "Title"),
    ] {
        specs.push(nullary(shape, attribute, op).returns(shape));
    }
    for (attribute, op) in [
        ("isalnum", "Isalnum"),
        ("isalpha", "Isalpha"),
        ("isdigit", "Isdigit"),
        ("islower", "Islower"),
        ("isspace", "Isspace"),
        ("istitle", "Istitle"),
        ("isupper", "Isupper"),
    ] {
        specs.push(nullary(shape, attribute, op));
    }

    for (attribute, ops) in [
        ("count", ["Count2", "Count3", "Count4"]),
        ("find", ["Find2", "Find3", "Find4"]),
        ("rfind", ["Rfind2", "Rfind3", "Rfind4"]),
        ("index", ["Index2", "Index3", "Index4"]),
        ("rindex", ["Rindex2", "Rindex3", "Rindex4"]),
    ] {
        specs.push(ranged(shape, attribute, ParamSpec::any("sub"), ops));
    }
    specs.push(ranged(
        shape,
        "startswith",
        ParamSpec::any("prefix"),
        ["Startswith2", "Startswith3", "Startswith4"],
    ));
    specs.push(ranged(
        shape,
        "endswith",
        ParamSpec::any("suffix"),
        ["Endswith2", "Endswith3", "Endswith4"],
    ));

    specs.push(padded(shape, "center", ["Center2", "Center3"]));
    specs.push(padded(shape, "ljust", ["Ljust2", "Ljust3"]));
    specs.push(padded(shape, "rjust", ["Rjust2", "Rjust3"]));
    specs.push(
        OperationSpec::new("zfill", shape)
            .params(&[ParamSpec::any("width")])
            .single("Zfill"),
    );

    for (attribute, ops) in [
        ("strip", ["Strip1", "Strip2"]),
        ("lstrip", ["Lstrip1", "Lstrip2"]),
        ("rstrip", ["Rstrip1", "Rstrip2"]),
    ] {
        specs.push(optional_one(shape, attribute, ParamSpec::any("chars"), ops));
    }
    for (attribute, param, ops) in [
        ("expandtabs", "tabsize", ["Expandtabs1", "Expandtabs2"]),
        ("splitlines", "keepends", ["Splitlines1", "Splitlines2"]),
    ] {
        specs.push(optional_one(shape, attribute, ParamSpec::any(param), ops).keywords());
    }

    // Only separators proven to be of the receiver's own shape are handled.
    for (attribute, ops) in [
        ("split", ["Split1", "Split2", "Split3"]),
        ("rsplit", ["Rsplit1", "Rsplit2", "Rsplit3"]),
    ] {
        specs.push(
            optional_two(
                shape,
                attribute,
                [ParamSpec::exact("sep", shape), ParamSpec::any("maxsplit")],
                ops,
            )
            .keywords(),
        );
    }
    for (attribute, op) in [("partition", "Partition"), ("rpartition", "Rpartition")] {
        specs.push(
            OperationSpec::new(attribute, shape)
                .params(&[ParamSpec::exact("sep", shape)])
                .single(op),
        );
    }

    specs.push(
        OperationSpec::new("replace", shape)
            .params(&[
                ParamSpec::any("old"),
                ParamSpec::any("new"),
                ParamSpec::any("count"),
            ])
            .variations(vec![
                Variation::new("Replace3", &[0, 1], Base),
                Variation::new("Replace4", &[0, 1, 2], Supplied(2)),
            ]),
    );
    specs.push(
        OperationSpec::new("join", shape)
            .params(&[ParamSpec::any("iterable")])
            .single("Join"),
    );

    // Translation tables come in too many forms to specialize.
    specs.push(OperationSpec::new("translate", shape));

    let codec_params = [ParamSpec::any("encoding"), ParamSpec::any("errors")];
    match shape {
        Shape::Str => {
            specs.push(
                optional_two(shape, "encode", codec_params, ["Encode1", "Encode2", "Encode3"])
                    .keywords(),
            );
            specs.push(
                optional_two(shape, "decode", codec_params, ["Decode1", "Decode2", "Decode3"])
                    .keywords()
                    .applicable(VersionPredicate::LegacyOnly),
            );
            specs.push(
                nullary(shape, "casefold", "Casefold")
                    .returns(shape)
                    .applicable(VersionPredicate::ModernOnly),
            );
            for (attribute, op) in [
                ("isascii", "Isascii"),
                ("isdecimal", "Isdecimal"),
                ("isidentifier", "Isidentifier"),
                ("isnumeric", "Isnumeric"),
                ("isprintable", "Isprintable"),
            ] {
                specs.push(nullary(shape, attribute, op).applicable(VersionPredicate::ModernOnly));
            }
            // Arbitrary positional and keyword fields; never specialized.
            specs.push(OperationSpec::new("format", shape));
        }
        Shape::Bytes => {
            specs.push(
                optional_two(shape, "decode", codec_params, ["Decode1", "Decode2", "Decode3"])
                    .keywords(),
            );
        }
        Shape::Dict => {}
    }

    for spec in &mut specs[start..] {
        if spec.applicable == VersionPredicate::Always {
            spec.applicable = applicable;
        }
    }
}
