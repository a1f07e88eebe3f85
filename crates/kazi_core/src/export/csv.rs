//! `field,value` CSV rendering (RFC 4180 quoting, CRLF rows, UTF-8 BOM).

const BOM: char = '\u{feff}';

pub(super) fn render(pairs: &[(String, String)]) -> String {
    let mut out = String::new();
    out.push(BOM);
    push_row(&mut out, "field", "value");
    for (field, value) in pairs {
        push_row(&mut out, field, value);
    }
    out
}

fn push_row(out: &mut String, field: &str, value: &str) {
    push_cell(out, field);
    out.push(',');
    push_cell(out, value);
    out.push_str("\r\n");
}

fn push_cell(out: &mut String, cell: &str) {
    if cell.contains([',', '"', '\r', '\n']) {
        out.push('"');
        out.push_str(&cell.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(cell);
    }
}
