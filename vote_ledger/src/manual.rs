/*!

This is the long-form manual for `vote_ledger` and `qrtally`.

## Payload format

A ballot-tally QR code contains a single line of text made of tokens
separated by spaces:

```text
QRBU:1:1 VRQR:1.5 ORIG:VOTA ... CARG:11 PART:13 13:16 PART:45 45:120 APTA:187 NOMI:136 BRAN:20 NULO:23 ...
```

Only the tokens with exactly one `:` are considered, and among them only:
* a candidate number as the key: the value is the number of votes of the candidate.
  The office is deduced from the length of the number:
  - 2 digits: mayor (for instance `13:16`)
  - 5 digits: councilor (for instance `45123:7`)
  - other lengths are ignored.
* `BRAN`: the number of blank votes.
* `NULO`: the number of null votes.

All the other tokens (header fields, party totals, hashes) are ignored. A
payload without any of the tokens above is rejected, and the scan is kept as
failed.

### Malformed values

A token like `12:abc` or `12:-3` has a known key but a value that is not a
non-negative integer. Two policies are available:
* `skip` (default): the token is ignored and the rest of the payload is read.
* `abort`: the whole payload is rejected.

## Removing scans

Each scan receives an identity when it is ingested (`#1`, `#2`, ...). The
identities never change and are never reused, even after removals. Removing a
scan subtracts exactly the votes it brought. If the ledger does not contain
these votes, the removal is refused and nothing changes: this can only happen
if the ledger and the scans have diverged, and it is reported as a fatal error.

## Rankings and exports

The ranking of an office lists the candidates with at least one vote, most
voted first, in the order of the candidate numbers for equal counts, and is
limited to 15 candidates by default.

The export lists all the candidates known to the ledger, including those with
zero votes, one sheet per office (`Mayor`, `Councilor`) with the columns
`Candidate` and `Votes`. `qrtally` writes the sheets to one workbook
(`resultados_votacao.xlsx`), or to one CSV file per office with
`"exportFormat": "csv"`.

## Configuration

The `qrtally` program accepts a JSON configuration file:

```json
{
  "outputSettings": {
    "outputDirectory": "results",
    "exportName": "resultados_votacao",
    "rankingLimit": 15,
    "exportFormat": "xlsx"
  },
  "decoder": {
    "provider": "qrserver",
    "url": "http://api.qrserver.com/v1/read-qr-code/",
    "timeoutSeconds": 30
  },
  "parser": { "malformedTokenPolicy": "skip" },
  "sources": [
    { "filePath": "section_1081.png" },
    { "filePath": "section_1082.txt", "provider": "payload" }
  ]
}
```

Decoder providers:
* `qrserver`: the image is sent to the remote decoding service.
* `payload`: the file already contains the decoded text of the QR code.

*/
